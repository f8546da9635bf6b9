//! The animation engine.
//!
//! [`Starfield`] owns the stars, the link graph and the transition state. It
//! borrows nothing from the host except through two capabilities handed to
//! [`Starfield::attach`]: a [`Surface`] to draw on and a [`SizeSource`]
//! reporting the container it should fill.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --attach--> Ready --start--> Running --dispose--> Disposed
//! ```
//!
//! Every precondition failure (no surface, no container, zero-sized
//! container) leaves the engine where it was. Nothing here returns an error.
//!
//! # Example
//!
//! ```ignore
//! use starfield::prelude::*;
//!
//! let mut engine = Starfield::new(StarfieldConfig::default());
//! engine.attach(Some(Pixmap::new(1, 1)), FixedSize::new(1024, 318));
//! let token = engine.start();
//!
//! // Once per display refresh:
//! if engine.on_frame(timestamp_ms) == FrameRequest::Stop {
//!     // stop scheduling
//! }
//! ```

use glam::Vec2;

use crate::config::StarfieldConfig;
use crate::connections::{Connections, Edge, EdgeStyle};
use crate::physics;
use crate::render::{self, RenderStyle, Surface};
use crate::scheduler::{FrameRequest, FrameToken, SizeSource};
use crate::star::{Star, StarField};
use crate::time::Time;
use crate::transition::{FadeIn, PopulationEasing};

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No surface or container yet.
    Uninitialized,
    /// Attached and populated, not animating.
    Ready,
    /// Accepting frames.
    Running,
    /// Torn down. Terminal.
    Disposed,
}

/// Decorative starfield animation.
pub struct Starfield<S: Surface, Z: SizeSource> {
    config: StarfieldConfig,
    state: EngineState,
    surface: Option<S>,
    sizes: Option<Z>,
    /// Last size applied to the surface.
    size: Option<(u32, u32)>,
    /// Last container size reported by `sizes`.
    observed: Option<(u32, u32)>,
    field: StarField,
    connections: Connections,
    radius: f32,
    time: Time,
    fade: FadeIn,
    easing: Option<PopulationEasing>,
    token: Option<FrameToken>,
}

impl<S: Surface, Z: SizeSource> Starfield<S, Z> {
    pub fn new(config: StarfieldConfig) -> Self {
        if let Err(e) = config.validate() {
            log::warn!("{}", e);
        }
        let fade = match config.fade_in {
            Some(fade) => FadeIn::new(fade),
            None => FadeIn::complete(),
        };
        Self {
            state: EngineState::Uninitialized,
            surface: None,
            sizes: None,
            size: None,
            observed: None,
            field: StarField::new(config.seed),
            connections: Connections::new(config.connection_mode),
            radius: 0.0,
            time: Time::new().with_max_delta(config.max_frame_delta_ms),
            fade,
            easing: config.population_easing.map(PopulationEasing::new),
            token: None,
            config,
        }
    }

    /// Bind the engine to a surface and its container.
    ///
    /// Succeeds only from [`EngineState::Uninitialized`], with a surface,
    /// and with a container of non-zero size. On success the surface is
    /// sized to the container, the field is populated and the engine is
    /// [`EngineState::Ready`]. Returns whether the engine is now ready.
    pub fn attach(&mut self, surface: Option<S>, sizes: Z) -> bool {
        if self.state != EngineState::Uninitialized {
            return false;
        }
        let Some(surface) = surface else {
            log::debug!("no drawing surface, starfield stays idle");
            return false;
        };
        let Some((width, height)) = sizes.container_size().filter(|&(w, h)| w > 0 && h > 0) else {
            log::debug!("no sized container, starfield stays idle");
            return false;
        };

        self.surface = Some(surface);
        self.sizes = Some(sizes);
        self.observed = Some((width, height));
        self.resize_to(width, height);
        self.state = EngineState::Ready;
        log::info!("starfield attached at {}x{}", width, height);
        true
    }

    /// Begin animating.
    ///
    /// Returns the token that cancels the animation, or `None` if the engine
    /// is not [`EngineState::Ready`].
    pub fn start(&mut self) -> Option<FrameToken> {
        if self.state != EngineState::Ready {
            return None;
        }
        let token = FrameToken::new();
        self.token = Some(token.clone());
        self.time.reset();
        self.state = EngineState::Running;
        log::info!("starfield running with {} stars", self.field.len());
        Some(token)
    }

    /// Advance and draw one frame at host timestamp `timestamp_ms`.
    pub fn on_frame(&mut self, timestamp_ms: f64) -> FrameRequest {
        if self.state != EngineState::Running {
            return FrameRequest::Stop;
        }
        if self.token.as_ref().map_or(true, FrameToken::is_cancelled) {
            return FrameRequest::Stop;
        }

        let (_, delta_ms) = self.time.update(timestamp_ms);
        let now = self.time.now();

        self.fade.advance(now);
        if let Some(easing) = &mut self.easing {
            let remove = easing.on_frame(self.fade.progress(), delta_ms, self.config.frame_budget_ms());
            if remove > 0 {
                let keep = self.field.len().saturating_sub(remove);
                log::debug!("easing population: {} -> {} stars", self.field.len(), keep);
                self.field.truncate(keep);
                self.connections.truncate(keep);
            }
        }

        // Only a change in the container itself resyncs the surface, so a
        // window-level resize survives until the container moves again.
        let reading = self.sizes.as_ref().and_then(|s| s.container_size());
        if reading.is_some() && reading != self.observed {
            self.observed = reading;
            if let Some((width, height)) = reading {
                self.resize_to(width, height);
            }
        }

        let Some((width, height)) = self.size else {
            return FrameRequest::Continue;
        };
        let step = self.config.step_mode.step(delta_ms, self.config.fps);
        physics::advance_all(
            self.field.stars_mut(),
            step,
            Vec2::new(width as f32, height as f32),
        );

        let edge_style = self.edge_style();
        let edges = self.connections.update(now, self.field.stars(), &edge_style);

        if let Some(surface) = self.surface.as_mut() {
            let style = RenderStyle {
                star_color: self.config.star_color,
                connection_color: self.config.connection_color,
                blend_mode: self.config.blend_mode,
                alpha: self.config.transparency * self.fade.progress(),
            };
            render::render(surface, self.field.stars(), edges, &style);
        }

        FrameRequest::Continue
    }

    /// Apply a window-level resize that only reports the new width.
    ///
    /// The height is kept. The new width stays applied until the container
    /// reports a different size. Ignored before attach and after dispose.
    pub fn on_window_resize(&mut self, width: u32) {
        if !matches!(self.state, EngineState::Ready | EngineState::Running) {
            return;
        }
        if let Some((_, height)) = self.size {
            self.resize_to(width, height);
        }
    }

    /// Tear the engine down: cancel the animation and stop observing the
    /// container. Further frames are no-ops.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(sizes) = self.sizes.as_mut() {
            sizes.disconnect();
        }
        self.state = EngineState::Disposed;
        log::info!("starfield disposed after {} frames", self.time.frame());
    }

    /// Swap in a hand-made population, keeping the current surface size.
    pub fn replace_stars(&mut self, stars: Vec<Star>) {
        self.field.replace(stars);
        self.connections.invalidate();
    }

    /// Resize-sync: reallocate and repopulate only when the size changed.
    ///
    /// Returns whether anything happened.
    fn resize_to(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || self.size == Some((width, height)) {
            return false;
        }

        if let Some(surface) = self.surface.as_mut() {
            surface.resize(width, height);
        }
        self.size = Some((width, height));

        let (w, h) = (width as f32, height as f32);
        match self.config.resolve(w, h) {
            Some(targets) => {
                self.field.populate(targets.star_count, w, h, self.config.star_speed);
                self.radius = targets.connection_radius;
            }
            None => {
                self.field.replace(Vec::new());
                self.radius = 0.0;
            }
        }
        self.connections.invalidate();

        log::debug!(
            "resized to {}x{}: {} stars, link radius {}",
            width,
            height,
            self.field.len(),
            self.radius
        );
        true
    }

    fn edge_style(&self) -> EdgeStyle {
        EdgeStyle {
            radius: self.radius,
            base_width: self.config.connection_base_width,
            falloff: self.config.falloff,
        }
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &StarfieldConfig {
        &self.config
    }

    pub fn stars(&self) -> &[Star] {
        self.field.stars()
    }

    /// Edges drawn in the most recent frame.
    pub fn edges(&self) -> &[Edge] {
        self.connections.edges()
    }

    /// Current fade-in multiplier.
    pub fn fade_progress(&self) -> f32 {
        self.fade.progress()
    }

    pub fn connection_radius(&self) -> f32 {
        self.radius
    }

    /// Last size applied to the surface.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub fn time(&self) -> &Time {
        &self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionRange, Population};
    use crate::connections::ConnectionMode;
    use crate::render::CommandList;
    use crate::scheduler::{FixedSize, FrameLoop, SharedSize};

    fn config() -> StarfieldConfig {
        StarfieldConfig::default().with_seed(7)
    }

    fn ready(config: StarfieldConfig, w: u32, h: u32) -> Starfield<CommandList, SharedSize> {
        let mut engine = Starfield::new(config);
        assert!(engine.attach(Some(CommandList::new(0, 0)), SharedSize::new(w, h)));
        engine
    }

    #[test]
    fn test_attach_without_surface_is_noop() {
        let mut engine: Starfield<CommandList, FixedSize> = Starfield::new(config());
        assert!(!engine.attach(None, FixedSize::new(100, 100)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.start().is_none());
        assert_eq!(engine.on_frame(0.0), FrameRequest::Stop);
    }

    #[test]
    fn test_attach_without_container_is_noop() {
        let mut engine = Starfield::new(config());
        assert!(!engine.attach(Some(CommandList::new(0, 0)), SharedSize::empty()));
        assert!(!engine.attach(Some(CommandList::new(0, 0)), SharedSize::new(300, 0)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.stars().is_empty());
    }

    #[test]
    fn test_attach_populates_from_density() {
        let engine = ready(config(), 1024, 318);
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.stars().len(), 90);
        assert_eq!(engine.connection_radius(), 100.0);
        assert_eq!(engine.surface().unwrap().size(), (1024, 318));
    }

    #[test]
    fn test_frames_render_until_disposed() {
        let mut engine = ready(config(), 400, 300);
        let token = engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);

        let mut frames = FrameLoop::at_fps(60.0);
        assert_eq!(frames.run(&mut engine, 10), 10);
        let stars = engine.stars().len();
        assert_eq!(engine.surface().unwrap().circles().count(), stars);

        engine.dispose();
        assert!(token.is_cancelled());
        assert_eq!(engine.state(), EngineState::Disposed);

        let recorded = engine.surface().unwrap().commands().len();
        assert_eq!(frames.run(&mut engine, 10), 0);
        assert_eq!(engine.surface().unwrap().commands().len(), recorded);
    }

    #[test]
    fn test_cancelled_token_stops_frames() {
        let mut engine = ready(config(), 400, 300);
        let token = engine.start().unwrap();
        assert_eq!(engine.on_frame(0.0), FrameRequest::Continue);
        token.cancel();
        assert_eq!(engine.on_frame(16.0), FrameRequest::Stop);
    }

    #[test]
    fn test_unchanged_size_does_not_touch_surface() {
        let host = SharedSize::new(400, 300);
        let mut engine = Starfield::new(config());
        engine.attach(Some(CommandList::new(0, 0)), host.clone());
        engine.start();

        let mut frames = FrameLoop::at_fps(60.0);
        frames.run(&mut engine, 5);
        assert_eq!(engine.surface().unwrap().resize_count(), 1);

        host.set(500, 300);
        frames.run(&mut engine, 5);
        assert_eq!(engine.surface().unwrap().resize_count(), 2);
        assert_eq!(engine.size(), Some((500, 300)));
    }

    #[test]
    fn test_window_resize_adjusts_width() {
        let mut engine: Starfield<CommandList, FixedSize> = Starfield::new(config());
        engine.attach(Some(CommandList::new(0, 0)), FixedSize::new(400, 300));
        engine.on_window_resize(800);
        assert_eq!(engine.size(), Some((800, 300)));
        engine.on_window_resize(800);
        assert_eq!(engine.surface().unwrap().resize_count(), 2);
        engine.on_window_resize(0);
        assert_eq!(engine.size(), Some((800, 300)));
    }

    #[test]
    fn test_window_resize_survives_next_frame() {
        let host = SharedSize::new(400, 300);
        let mut engine = Starfield::new(config());
        engine.attach(Some(CommandList::new(0, 0)), host.clone());
        engine.start();

        let mut frames = FrameLoop::at_fps(60.0);
        frames.run(&mut engine, 1);
        engine.on_window_resize(800);
        let stars = engine.stars().len();

        frames.run(&mut engine, 5);
        assert_eq!(engine.size(), Some((800, 300)));
        assert_eq!(engine.stars().len(), stars);
        assert_eq!(engine.surface().unwrap().resize_count(), 2);

        // A real container change still wins
        host.set(500, 200);
        frames.run(&mut engine, 1);
        assert_eq!(engine.size(), Some((500, 200)));
        assert_eq!(engine.surface().unwrap().resize_count(), 3);
    }

    #[test]
    fn test_global_alpha_follows_fade() {
        let mut engine = ready(config().with_transparency(0.5), 200, 200);
        engine.start();
        engine.on_frame(0.0);
        assert_eq!(
            engine.surface().unwrap().last_frame()[2],
            crate::render::DrawCommand::GlobalAlpha(0.0)
        );

        let mut engine = ready(config().with_transparency(0.5).with_fade_in(None), 200, 200);
        engine.start();
        engine.on_frame(0.0);
        assert_eq!(
            engine.surface().unwrap().last_frame()[2],
            crate::render::DrawCommand::GlobalAlpha(0.5)
        );
    }

    #[test]
    fn test_fixed_population_and_radius() {
        let config = config()
            .with_population(Population::Fixed { count: 12 })
            .with_connection_range(ConnectionRange::Pixels(40.0))
            .with_connection_mode(ConnectionMode::PerFrame);
        let engine = ready(config, 300, 300);
        assert_eq!(engine.stars().len(), 12);
        assert_eq!(engine.connection_radius(), 40.0);
    }

    #[test]
    fn test_radius_stays_constant() {
        let mut engine = ready(config(), 600, 400);
        let radii: Vec<f32> = engine.stars().iter().map(|s| s.radius).collect();
        engine.start();
        FrameLoop::at_fps(60.0).run(&mut engine, 200);
        let after: Vec<f32> = engine.stars().iter().map(|s| s.radius).collect();
        assert_eq!(radii, after);
    }
}
