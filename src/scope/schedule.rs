//! Single-shot deferred work for the scope tracker.
//!
//! The host drives time: it passes `now` in and asks whether the pending
//! batch is due. There is at most one pending deadline; scheduling again
//! replaces it.

use std::time::{Duration, Instant};

/// A retriggerable one-shot timer.
#[derive(Debug, Clone, Default)]
pub struct RebuildTimer {
    deadline: Option<Instant>,
}

impl RebuildTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the next run at `now + delay`, superseding any pending one.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Clear the timer and return true if it was due at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    /// Time left until the deadline, zero once due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_and_take() {
        let now = Instant::now();
        let mut timer = RebuildTimer::new();
        assert!(!timer.is_pending());
        timer.schedule(now, Duration::from_millis(5));
        assert!(timer.is_pending());
        assert!(!timer.is_due(now));
        assert!(!timer.take_due(now));
        let later = now + Duration::from_millis(5);
        assert!(timer.take_due(later));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_reschedule_supersedes() {
        let now = Instant::now();
        let mut timer = RebuildTimer::new();
        timer.schedule(now, Duration::from_millis(1));
        timer.schedule(now, Duration::from_millis(50));
        assert!(!timer.is_due(now + Duration::from_millis(10)));
        assert_eq!(
            timer.remaining(now + Duration::from_millis(10)),
            Some(Duration::from_millis(40))
        );
    }

    #[test]
    fn test_cancel() {
        let now = Instant::now();
        let mut timer = RebuildTimer::new();
        timer.schedule(now, Duration::ZERO);
        timer.cancel();
        assert!(!timer.take_due(now));
        assert_eq!(timer.remaining(now), None);
    }
}
