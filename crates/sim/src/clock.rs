use flowfield_common::FrameTime;
use std::time::{Duration, Instant};

/// Host-loop timer: monotonic elapsed seconds plus a clamped per-frame delta.
#[derive(Debug, Clone)]
pub struct FrameClock {
    max_delta: f32,
    elapsed: f64,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            max_delta,
            elapsed: 0.0,
            last: None,
        }
    }

    /// Advance by a measured wall-clock interval since the previous call.
    ///
    /// The first call yields a zero delta.
    pub fn update(&mut self) -> FrameTime {
        let now = Instant::now();
        let step = self
            .last
            .map_or(Duration::ZERO, |prev| now.saturating_duration_since(prev));
        self.last = Some(now);
        self.advance(step)
    }

    /// Advance by an explicit interval.
    ///
    /// Elapsed time accumulates the clamped delta, so a stall does not make
    /// the field animation jump ahead either.
    pub fn advance(&mut self, step: Duration) -> FrameTime {
        let time = FrameTime::new(self.elapsed as f32, step.as_secs_f32(), self.max_delta);
        self.elapsed += f64::from(time.delta);
        FrameTime {
            elapsed: self.elapsed as f32,
            delta: time.delta,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_accumulates_deltas() {
        let mut clock = FrameClock::new(0.1);
        let a = clock.advance(Duration::from_millis(16));
        let b = clock.advance(Duration::from_millis(16));
        assert!((a.delta - 0.016).abs() < 1e-6);
        assert!((b.elapsed - 0.032).abs() < 1e-6);
        assert!(b.elapsed > a.elapsed);
    }

    #[test]
    fn stall_is_clamped() {
        let mut clock = FrameClock::new(0.1);
        let t = clock.advance(Duration::from_secs(30));
        assert_eq!(t.delta, 0.1);
        assert_eq!(clock.elapsed(), 0.1);
    }

    #[test]
    fn first_update_has_zero_delta() {
        let mut clock = FrameClock::new(0.1);
        let t = clock.update();
        assert_eq!(t.delta, 0.0);
        assert_eq!(t.elapsed, 0.0);
    }

    #[test]
    fn long_sessions_do_not_drift() {
        let mut clock = FrameClock::new(0.1);
        let step = Duration::from_secs_f64(1.0 / 60.0);
        let frames = 1_000_000;
        let mut t = FrameTime::default();
        for _ in 0..frames {
            t = clock.advance(step);
        }
        let expected = frames as f64 * f64::from(t.delta);
        assert!((f64::from(t.elapsed) - expected).abs() < 1e-2);
        assert_eq!(t.elapsed, clock.elapsed());
    }

    #[test]
    fn elapsed_is_monotonic() {
        let mut clock = FrameClock::new(0.05);
        let mut last = 0.0;
        for _ in 0..20 {
            let t = clock.update();
            assert!(t.elapsed >= last);
            last = t.elapsed;
        }
    }
}
