//! Statistics for relay sessions and recordings

pub mod metrics;

pub use metrics::{PacingReport, RateWindow, SegmentStats, ServerStats};
