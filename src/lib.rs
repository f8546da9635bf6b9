//! # Starfield
//!
//! A decorative 2D particle animation: small stars drift across a surface,
//! bounce off its edges, and are joined by faint lines whenever two of them
//! come within a connection radius. Star count and radius scale with the
//! surface area through a calibrated density profile.
//!
//! ## Quick Start
//!
//! ```ignore
//! use starfield::prelude::*;
//!
//! let mut engine = Starfield::new(StarfieldConfig::default().with_seed(42));
//! engine.attach(Some(Pixmap::new(1, 1)), FixedSize::new(1024, 318));
//! engine.start();
//!
//! FrameLoop::at_fps(60.0).run(&mut engine, 120);
//! engine.surface().unwrap().save_png("frame.png")?;
//! ```
//!
//! Or open a window:
//!
//! ```ignore
//! starfield::run(StarfieldConfig::default())?;
//! ```
//!
//! ## Per-frame pipeline
//!
//! Every frame the engine, in order:
//!
//! 1. advances the fade-in and population easing timers,
//! 2. resizes and repopulates if the container size changed,
//! 3. moves every star and reflects it off the surface edges,
//! 4. rebuilds the link graph (every frame, or on a slower cadence),
//! 5. clears the surface and draws stars and links.
//!
//! ## Hosts
//!
//! The engine draws through [`Surface`] and observes its container through
//! [`SizeSource`]. The crate ships [`Pixmap`] (CPU drawing via `imageproc`,
//! PNG export), [`CommandList`] (records draw calls) and a winit window in
//! [`run`] whose surface draws stars and links with wgpu.

pub mod config;
pub mod connections;
pub mod density;
pub mod engine;
pub mod error;
mod gpu;
pub mod math;
pub mod physics;
pub mod raster;
pub mod render;
pub mod scheduler;
pub mod star;
pub mod time;
pub mod transition;
mod window;

pub use bytemuck;
pub use config::{ConnectionRange, Population, StarfieldConfig};
pub use connections::{ConnectionGraph, ConnectionMode, Edge, Falloff};
pub use density::{CalibrationPoint, DensityProfile, DensityTargets};
pub use engine::{EngineState, Starfield};
pub use error::{ConfigError, DensityError, ExportError, GpuError, RunError};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::{blend_state, Batch, DrawList, GpuSurface, Primitive, PRIMITIVE_SHADER};
pub use physics::StepMode;
pub use raster::Pixmap;
pub use render::{BlendMode, CommandList, DrawCommand, Surface};
pub use scheduler::{FixedSize, FrameLoop, FrameRequest, FrameToken, SharedSize, SizeSource};
pub use star::{Star, StarField};
pub use time::Time;
pub use transition::{EasingConfig, FadeInConfig};
pub use window::run;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use starfield::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConnectionRange, Population, StarfieldConfig};
    pub use crate::connections::{ConnectionMode, Falloff};
    pub use crate::engine::{EngineState, Starfield};
    pub use crate::physics::StepMode;
    pub use crate::raster::Pixmap;
    pub use crate::render::{BlendMode, CommandList, Surface};
    pub use crate::scheduler::{FixedSize, FrameLoop, FrameRequest, FrameToken, SharedSize, SizeSource};
    pub use crate::transition::{EasingConfig, FadeInConfig};
    pub use crate::{Vec2, Vec3, Vec4};
}
