//! Recorder configuration

use std::path::PathBuf;
use std::time::Duration;

use super::writer::WriterKind;

/// Recorder configuration options
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Segments land in `<storage_root>/<source>/`
    pub storage_root: PathBuf,

    /// Target pacing rate
    pub target_fps: u32,

    /// How often achieved vs. expected frame counts are logged
    pub stats_interval: Duration,

    /// Pause after a failed open or write before trying a fresh segment
    pub error_backoff: Duration,

    /// Consecutive failures after which recording is abandoned (0 = never)
    pub max_consecutive_failures: u32,

    /// Segment container
    pub writer: WriterKind,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("Data").join("cam"),
            target_fps: 30,
            stats_interval: Duration::from_secs(5),
            error_backoff: Duration::from_millis(100),
            max_consecutive_failures: 10,
            writer: WriterKind::Y4m,
        }
    }
}

impl RecorderConfig {
    /// Create a config rooted at `storage_root`
    pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Default::default()
        }
    }

    /// Set the target frame rate (at least 1)
    pub fn target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps.max(1);
        self
    }

    /// Set the stats interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Set the error backoff
    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Set the failure ceiling
    pub fn max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Set the segment writer
    pub fn writer(mut self, writer: WriterKind) -> Self {
        self.writer = writer;
        self
    }

    /// Time between frames at the target rate
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}
