//! Statistics and metrics for relay sessions and recordings

use std::time::{Duration, Instant};

/// Statistics for one finalized recording segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentStats {
    /// Session start, epoch milliseconds
    pub start_ms: i64,
    /// Session end, epoch milliseconds
    pub end_ms: i64,
    /// Frames written to the segment
    pub frames_written: u64,
    /// Writes that reused the previously written frame because the source
    /// produced nothing new in time
    pub repeated_frames: u64,
    /// Frame dimensions
    pub width: u32,
    pub height: u32,
}

impl SegmentStats {
    /// Wall-clock length of the segment
    pub fn duration(&self) -> Duration {
        Duration::from_millis((self.end_ms - self.start_ms).max(0) as u64)
    }

    /// Achieved frame rate over the whole segment
    pub fn fps(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames_written as f64 / secs
        } else {
            0.0
        }
    }
}

/// Achieved vs. expected frame count over one reporting window
#[derive(Debug, Clone, PartialEq)]
pub struct PacingReport {
    /// Window length
    pub window: Duration,
    /// Frames the target rate called for
    pub expected: u64,
    /// Frames actually written
    pub actual: u64,
}

impl PacingReport {
    /// Achieved frames per second
    pub fn fps(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs > 0.0 {
            self.actual as f64 / secs
        } else {
            0.0
        }
    }

    /// Expected minus actual, never negative
    pub fn dropped(&self) -> u64 {
        self.expected.saturating_sub(self.actual)
    }
}

/// Rolling counter that produces a [`PacingReport`] once per interval
#[derive(Debug, Clone)]
pub struct RateWindow {
    target_fps: u32,
    started: Instant,
    count: u64,
}

impl RateWindow {
    pub fn new(target_fps: u32, now: Instant) -> Self {
        Self {
            target_fps,
            started: now,
            count: 0,
        }
    }

    /// Count one written frame
    pub fn record(&mut self) {
        self.count += 1;
    }

    /// Restart the window
    pub fn reset(&mut self, now: Instant) {
        self.started = now;
        self.count = 0;
    }

    /// If `interval` has elapsed, close the window and return its report
    pub fn maybe_report(&mut self, now: Instant, interval: Duration) -> Option<PacingReport> {
        let window = now.saturating_duration_since(self.started);
        if window < interval {
            return None;
        }

        let report = PacingReport {
            window,
            expected: (window.as_secs_f64() * self.target_fps as f64) as u64,
            actual: self.count,
        };
        self.reset(now);
        Some(report)
    }
}

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Currently connected viewers
    pub active_connections: u64,
    /// Frames published by the capture pipeline
    pub frames_published: u64,
    /// Frames written to viewer sockets, summed over sessions
    pub frames_sent: u64,
    /// Bytes written to viewer sockets, including length prefixes
    pub bytes_sent: u64,
    /// Uptime
    pub uptime: Duration,
}
