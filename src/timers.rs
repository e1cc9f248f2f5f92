//! Timers driven by an explicit simulation clock.
//!
//! The host passes the current time in seconds into every tick, so timers
//! never read a wall clock and replays stay deterministic.

/// Elapsed time reported by an [`IntervalTimer`] that was never started.
pub const NEVER_STARTED_ELAPSED: f32 = 99_999.9;

/// Counts down to a deadline.
///
/// An invalidated (never started) timer reports itself as elapsed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CountdownTimer {
    deadline: Option<f32>,
    duration: f32,
}

impl CountdownTimer {
    pub fn start(&mut self, now: f32, duration: f32) {
        self.duration = duration.max(0.0);
        self.deadline = Some(now + self.duration);
    }

    pub fn invalidate(&mut self) {
        self.deadline = None;
        self.duration = 0.0;
    }

    pub fn has_started(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_elapsed(&self, now: f32) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    /// True while the timer runs and has not yet reached its deadline.
    pub fn is_running(&self, now: f32) -> bool {
        self.has_started() && !self.is_elapsed(now)
    }

    pub fn remaining(&self, now: f32) -> f32 {
        self.deadline.map_or(0.0, |deadline| (deadline - now).max(0.0))
    }

    pub fn deadline(&self) -> Option<f32> {
        self.deadline
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }
}

/// Measures time since it was last started.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntervalTimer {
    started_at: Option<f32>,
}

impl IntervalTimer {
    pub fn start(&mut self, now: f32) {
        self.started_at = Some(now);
    }

    pub fn invalidate(&mut self) {
        self.started_at = None;
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<f32> {
        self.started_at
    }

    pub fn elapsed(&self, now: f32) -> f32 {
        self.started_at
            .map_or(NEVER_STARTED_ELAPSED, |start| (now - start).max(0.0))
    }

    pub fn is_greater_than(&self, now: f32, duration: f32) -> bool {
        self.elapsed(now) > duration
    }

    pub fn is_less_than(&self, now: f32, duration: f32) -> bool {
        self.elapsed(now) < duration
    }
}
