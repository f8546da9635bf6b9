//! Frame scheduling primitives shared between the engine and its hosts.
//!
//! The engine does not reschedule itself. A host (window event loop,
//! headless renderer, test) calls [`Starfield::on_frame`] and keeps calling
//! it for as long as it answers [`FrameRequest::Continue`]. Tearing down is
//! cooperative: a cancelled [`FrameToken`] makes the next frame a no-op that
//! answers [`FrameRequest::Stop`].

use std::cell::Cell;
use std::rc::Rc;

use crate::engine::Starfield;
use crate::render::Surface;

/// What the host should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Schedule another frame.
    Continue,
    /// The engine is finished; stop scheduling frames.
    Stop,
}

/// Cancellation handle for a running animation.
///
/// Cloning yields another handle to the same flag. Cancelling any clone
/// stops the engine at its next frame.
#[derive(Debug, Clone, Default)]
pub struct FrameToken {
    cancelled: Rc<Cell<bool>>,
}

impl FrameToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Reports the size of the container the surface should fill.
///
/// The engine polls this once per frame. `None` or a zero dimension means
/// there is nothing to draw into.
pub trait SizeSource {
    fn container_size(&self) -> Option<(u32, u32)>;

    /// Stop observing the container. Called once when the engine is disposed.
    fn disconnect(&mut self) {}
}

/// A container that never changes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSize {
    pub width: u32,
    pub height: u32,
}

impl FixedSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl SizeSource for FixedSize {
    fn container_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

/// A container size that another part of the host updates.
///
/// Clones share the same value: keep one in the event handler to call
/// [`SharedSize::set`] on resize, and hand another to the engine.
#[derive(Debug, Clone)]
pub struct SharedSize {
    size: Rc<Cell<Option<(u32, u32)>>>,
    connected: bool,
}

impl SharedSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Rc::new(Cell::new(Some((width, height)))),
            connected: true,
        }
    }

    /// A size source with no container yet.
    pub fn empty() -> Self {
        Self {
            size: Rc::new(Cell::new(None)),
            connected: true,
        }
    }

    pub fn set(&self, width: u32, height: u32) {
        self.size.set(Some((width, height)));
    }

    /// The container went away.
    pub fn clear(&self) {
        self.size.set(None);
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Default for SharedSize {
    fn default() -> Self {
        Self::empty()
    }
}

impl SizeSource for SharedSize {
    fn container_size(&self) -> Option<(u32, u32)> {
        if self.connected {
            self.size.get()
        } else {
            None
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Drives an engine with synthetic timestamps at a fixed frame interval.
///
/// ```ignore
/// let mut frames = FrameLoop::at_fps(60.0);
/// frames.run(&mut engine, 120);
/// ```
#[derive(Debug, Clone)]
pub struct FrameLoop {
    now_ms: f64,
    interval_ms: f64,
    frames: u64,
}

impl FrameLoop {
    /// Start at `start_ms`, advancing `interval_ms` per frame.
    pub fn new(start_ms: f64, interval_ms: f64) -> Self {
        Self {
            now_ms: start_ms,
            interval_ms: interval_ms.max(0.0),
            frames: 0,
        }
    }

    pub fn at_fps(fps: f64) -> Self {
        let interval = if fps > 0.0 { 1000.0 / fps } else { 0.0 };
        Self::new(0.0, interval)
    }

    /// Timestamp the next frame will receive.
    #[inline]
    pub fn now(&self) -> f64 {
        self.now_ms
    }

    /// Frames delivered so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Let time pass without delivering frames, like a hidden tab.
    pub fn skip(&mut self, ms: f64) {
        self.now_ms += ms.max(0.0);
    }

    /// Deliver one frame.
    pub fn step<S, Z>(&mut self, engine: &mut Starfield<S, Z>) -> FrameRequest
    where
        S: Surface,
        Z: SizeSource,
    {
        let request = engine.on_frame(self.now_ms);
        if request == FrameRequest::Continue {
            self.frames += 1;
            self.now_ms += self.interval_ms;
        }
        request
    }

    /// Deliver up to `count` frames, stopping early if the engine stops.
    ///
    /// Returns the number of frames the engine accepted.
    pub fn run<S, Z>(&mut self, engine: &mut Starfield<S, Z>, count: usize) -> usize
    where
        S: Surface,
        Z: SizeSource,
    {
        let mut accepted = 0;
        for _ in 0..count {
            if self.step(engine) == FrameRequest::Stop {
                break;
            }
            accepted += 1;
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = FrameToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_shared_size() {
        let host = SharedSize::new(100, 50);
        let mut engine_side = host.clone();
        assert_eq!(engine_side.container_size(), Some((100, 50)));

        host.set(200, 80);
        assert_eq!(engine_side.container_size(), Some((200, 80)));

        host.clear();
        assert_eq!(engine_side.container_size(), None);

        host.set(1, 1);
        engine_side.disconnect();
        assert!(!engine_side.is_connected());
        assert_eq!(engine_side.container_size(), None);
        assert!(host.is_connected());
    }

    #[test]
    fn test_fixed_size() {
        assert_eq!(FixedSize::new(3, 4).container_size(), Some((3, 4)));
    }

    #[test]
    fn test_frame_loop_clock() {
        let mut frames = FrameLoop::at_fps(50.0);
        assert_eq!(frames.now(), 0.0);
        frames.skip(1000.0);
        assert_eq!(frames.now(), 1000.0);
        frames.skip(-5.0);
        assert_eq!(frames.now(), 1000.0);
    }
}
