//! Frame timing driven by host timestamps.
//!
//! The engine never reads a clock itself. Every frame the host hands it a
//! monotonically increasing timestamp in milliseconds (the value a display
//! refresh callback receives), and everything time-related is derived from
//! those values. This keeps the simulation deterministic under test.
//!
//! # Example
//!
//! ```ignore
//! use starfield::time::Time;
//!
//! let mut time = Time::new();
//!
//! // In your frame callback:
//! time.update(timestamp_ms);
//!
//! println!("Elapsed: {:.0}ms", time.elapsed());
//! println!("Delta: {:.2}ms", time.delta());
//! println!("Frame: {}", time.frame());
//! println!("FPS: {:.1}", time.fps());
//! ```

/// Time tracking for the animation loop.
///
/// Provides elapsed time, delta time, frame counting and FPS from the
/// timestamps passed to [`Time::update`].
#[derive(Debug, Clone)]
pub struct Time {
    /// Timestamp of the first frame.
    start: Option<f64>,
    /// Timestamp of the last frame.
    last_frame: f64,
    /// Total elapsed time in milliseconds.
    elapsed_ms: f64,
    /// Time since last frame in milliseconds.
    delta_ms: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Timestamp of last FPS calculation.
    fps_update_time: f64,
    /// How often to update FPS calculation.
    fps_update_interval_ms: f64,
    /// Upper bound on a single frame's delta.
    max_delta_ms: Option<f32>,
}

impl Time {
    /// Create a time tracker that starts on the first update.
    pub fn new() -> Self {
        Self {
            start: None,
            last_frame: 0.0,
            elapsed_ms: 0.0,
            delta_ms: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: 0.0,
            fps_update_interval_ms: 500.0,
            max_delta_ms: None,
        }
    }

    /// Cap every frame delta at `max_ms`.
    ///
    /// A tab returning from the background can report seconds between two
    /// frames; capping stops stars from jumping across the surface.
    pub fn with_max_delta(mut self, max_ms: Option<f32>) -> Self {
        self.max_delta_ms = max_ms;
        self
    }

    /// Update timing values. Call once per frame.
    ///
    /// The first call only records the start time and reports a zero delta.
    /// Timestamps that go backwards are treated as zero-length frames.
    ///
    /// Returns `(elapsed_ms, delta_ms)` for convenience.
    pub fn update(&mut self, now: f64) -> (f64, f32) {
        let Some(start) = self.start else {
            self.start = Some(now);
            self.last_frame = now;
            self.fps_update_time = now;
            self.frame_count = 1;
            self.fps_frame_count = 1;
            return (0.0, 0.0);
        };

        let raw_delta = (now - self.last_frame).max(0.0) as f32;
        self.delta_ms = match self.max_delta_ms {
            Some(max) => raw_delta.min(max),
            None => raw_delta,
        };
        self.last_frame = self.last_frame.max(now);
        self.elapsed_ms = self.last_frame - start;
        self.frame_count += 1;

        let fps_elapsed = self.last_frame - self.fps_update_time;
        if fps_elapsed >= self.fps_update_interval_ms {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = (frames_since as f64 * 1000.0 / fps_elapsed) as f32;
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = self.last_frame;
        }

        (self.elapsed_ms, self.delta_ms)
    }

    /// Milliseconds since the first frame.
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.elapsed_ms
    }

    /// Milliseconds since the previous frame.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_ms
    }

    /// Timestamp of the most recent frame.
    #[inline]
    pub fn now(&self) -> f64 {
        self.last_frame
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Forget all history; the next update starts over.
    pub fn reset(&mut self) {
        *self = Self::new().with_max_delta(self.max_delta_ms);
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-delay cadence, polled with host timestamps.
///
/// After each firing the next one is scheduled `period` after the poll that
/// fired, like a timer re-armed from its own callback. Missed periods are not
/// caught up.
#[derive(Debug, Clone)]
pub struct Interval {
    period_ms: f64,
    first_delay_ms: f64,
    next_due: Option<f64>,
}

impl Interval {
    /// Cadence that fires on the first poll and every `period_ms` after.
    pub fn new(period_ms: f64) -> Self {
        Self::delayed(period_ms, 0.0)
    }

    /// Cadence whose first firing is `first_delay_ms` after the first poll.
    pub fn delayed(period_ms: f64, first_delay_ms: f64) -> Self {
        Self {
            period_ms: period_ms.max(0.0),
            first_delay_ms: first_delay_ms.max(0.0),
            next_due: None,
        }
    }

    #[inline]
    pub fn period(&self) -> f64 {
        self.period_ms
    }

    /// Returns `true` when the cadence fires at `now`.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.next_due {
            None if self.first_delay_ms <= 0.0 => {
                self.next_due = Some(now + self.period_ms);
                true
            }
            None => {
                self.next_due = Some(now + self.first_delay_ms);
                false
            }
            Some(due) if now >= due => {
                self.next_due = Some(now + self.period_ms);
                true
            }
            Some(_) => false,
        }
    }

    /// Fire on the next poll regardless of the schedule.
    pub fn reset(&mut self) {
        self.first_delay_ms = 0.0;
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_new() {
        let time = Time::new();
        assert_eq!(time.frame(), 0);
        assert_eq!(time.elapsed(), 0.0);
    }

    #[test]
    fn test_first_update_has_zero_delta() {
        let mut time = Time::new();
        let (elapsed, delta) = time.update(123_456.0);
        assert_eq!(elapsed, 0.0);
        assert_eq!(delta, 0.0);
        assert_eq!(time.frame(), 1);
    }

    #[test]
    fn test_time_update() {
        let mut time = Time::new();
        time.update(1000.0);
        let (elapsed, delta) = time.update(1016.0);
        assert_eq!(elapsed, 16.0);
        assert_eq!(delta, 16.0);
        assert_eq!(time.frame(), 2);
    }

    #[test]
    fn test_backwards_timestamp() {
        let mut time = Time::new();
        time.update(100.0);
        time.update(200.0);
        let (elapsed, delta) = time.update(150.0);
        assert_eq!(delta, 0.0);
        assert_eq!(elapsed, 100.0);
    }

    #[test]
    fn test_max_delta() {
        let mut time = Time::new().with_max_delta(Some(50.0));
        time.update(0.0);
        let (_, delta) = time.update(5000.0);
        assert_eq!(delta, 50.0);
        assert_eq!(time.elapsed(), 5000.0);
    }

    #[test]
    fn test_fps() {
        let mut time = Time::new();
        for i in 0..=60 {
            time.update(i as f64 * 10.0);
        }
        assert!((time.fps() - 100.0).abs() < 1.0);
    }

    #[test]
    fn test_interval_immediate() {
        let mut iv = Interval::new(100.0);
        assert!(iv.poll(0.0));
        assert!(!iv.poll(50.0));
        assert!(iv.poll(100.0));
        // Re-armed from 250, no catch-up
        assert!(iv.poll(250.0));
        assert!(!iv.poll(300.0));
        assert!(iv.poll(350.0));
    }

    #[test]
    fn test_interval_delayed() {
        let mut iv = Interval::delayed(100.0, 1000.0);
        assert!(!iv.poll(0.0));
        assert!(!iv.poll(999.0));
        assert!(iv.poll(1000.0));
        assert!(!iv.poll(1050.0));
        assert!(iv.poll(1100.0));
    }

    #[test]
    fn test_interval_reset() {
        let mut iv = Interval::delayed(100.0, 1000.0);
        iv.poll(0.0);
        iv.reset();
        assert!(iv.poll(1.0));
    }
}
