//! Drift-corrected frame pacing
//!
//! Deadlines are a running sum of fixed periods from the segment start
//! (`next += period`), so timing error does not accumulate the way a fixed
//! per-iteration sleep would. If a write leaves the loop more than a full
//! period behind, the schedule restarts at `now + period` instead of firing a
//! burst of catch-up writes.

use std::time::{Duration, Instant};

/// Result of advancing the schedule after a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceOutcome {
    /// Next deadline is still in the future
    OnSchedule,
    /// The loop fell behind; the schedule was restarted
    Reset {
        /// How far past the missed deadline the loop was
        behind: Duration,
    },
}

/// Absolute-deadline schedule
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    next: Instant,
}

impl Pacer {
    /// Schedule starting at `start` (first deadline is `start` itself)
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start,
        }
    }

    /// Time between frames
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadline of the next write
    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Remaining time until the deadline, zero if it has passed
    pub fn time_until_deadline(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Move to the next deadline after a write that finished at `now`
    pub fn advance(&mut self, now: Instant) -> PaceOutcome {
        self.next += self.period;

        if now > self.next {
            let behind = now - self.next;
            self.next = now + self.period;
            PaceOutcome::Reset { behind }
        } else {
            PaceOutcome::OnSchedule
        }
    }
}
