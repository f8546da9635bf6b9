//! Drawing stars and connections onto a 2D surface.
//!
//! The engine draws through the [`Surface`] trait, a small subset of a
//! canvas-style immediate-mode API. Three implementations ship with the
//! crate: [`CommandList`], which records what was drawn,
//! [`Pixmap`](crate::raster::Pixmap), which draws into an image, and
//! [`GpuSurface`](crate::GpuSurface), which draws into a window.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::connections::Edge;
use crate::star::Star;

/// How new strokes combine with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha blending (source over).
    Alpha,
    /// Keep the brighter of source and destination per channel.
    ///
    /// Overlapping translucent lines never darken each other, which keeps
    /// dense clusters of links luminous rather than muddy.
    #[default]
    Lighten,
    /// Add source to destination, saturating at white.
    Additive,
}

/// A drawing target of fixed pixel size.
pub trait Surface {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    /// Reallocate the surface. Contents are lost.
    fn resize(&mut self, width: u32, height: u32);

    /// Erase everything to transparent.
    fn clear(&mut self);

    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Alpha multiplier applied to everything drawn afterwards.
    fn set_global_alpha(&mut self, alpha: f32);

    /// Fill a circle with an RGBA color.
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Vec4);

    /// Stroke a straight line with an RGBA color.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Vec4);
}

/// Colors and compositing for one render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub star_color: Vec3,
    pub connection_color: Vec3,
    pub blend_mode: BlendMode,
    /// Global alpha for the whole pass.
    pub alpha: f32,
}

/// Clear the surface and draw one frame.
///
/// Each star is filled, followed by the links leading from it to
/// higher-indexed stars. `edges` must be ordered by `from`.
pub fn render<S: Surface + ?Sized>(surface: &mut S, stars: &[Star], edges: &[Edge], style: &RenderStyle) {
    surface.clear();
    surface.set_blend_mode(style.blend_mode);
    surface.set_global_alpha(style.alpha.clamp(0.0, 1.0));

    let star_color = style.star_color.extend(1.0);
    let mut pending = edges.iter().peekable();

    for (i, star) in stars.iter().enumerate() {
        surface.fill_circle(star.position, star.radius, star_color);

        while let Some(edge) = pending.next_if(|e| e.from <= i) {
            if edge.from < i {
                continue;
            }
            let Some(target) = stars.get(edge.to) else {
                continue;
            };
            surface.stroke_line(
                star.position,
                target.position,
                edge.width,
                style.connection_color.extend(edge.opacity),
            );
        }
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Resize { width: u32, height: u32 },
    Clear,
    BlendMode(BlendMode),
    GlobalAlpha(f32),
    Circle { center: Vec2, radius: f32, color: Vec4 },
    Line { from: Vec2, to: Vec2, width: f32, color: Vec4 },
}

/// A surface that records drawing calls instead of rasterizing them.
///
/// Useful for headless hosts that forward the calls elsewhere, and for
/// inspecting exactly what a frame drew. Each [`Surface::clear`] starts a
/// new frame and discards the previous one, so memory stays bounded by the
/// size of a single frame.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    resizes: usize,
}

impl CommandList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            resizes: 0,
        }
    }

    /// Commands recorded since the previous frame was discarded.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Commands since the most recent clear.
    pub fn last_frame(&self) -> &[DrawCommand] {
        let start = self
            .commands
            .iter()
            .rposition(|c| matches!(c, DrawCommand::Clear))
            .unwrap_or(0);
        &self.commands[start..]
    }

    /// Remove and return everything recorded so far.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of resize calls over the surface's lifetime.
    pub fn resize_count(&self) -> usize {
        self.resizes
    }

    /// Lines drawn in the last frame.
    pub fn lines(&self) -> impl Iterator<Item = &DrawCommand> {
        self.last_frame()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
    }

    /// Circles drawn in the last frame.
    pub fn circles(&self) -> impl Iterator<Item = &DrawCommand> {
        self.last_frame()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Circle { .. }))
    }
}

impl Surface for CommandList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resizes += 1;
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(DrawCommand::BlendMode(mode));
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.commands.push(DrawCommand::GlobalAlpha(alpha));
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Vec4) {
        self.commands.push(DrawCommand::Circle { center, radius, color });
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Vec4) {
        self.commands.push(DrawCommand::Line { from, to, width, color });
    }
}
