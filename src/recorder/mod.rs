//! Paced segment recording
//!
//! A [`Recorder`] receives decoded frames at the source's rate and writes them
//! to disk at a fixed target rate:
//!
//! ```text
//! update_frame() ──► latest slot ◄── pacing thread ──► SegmentWriter
//!                    (Arc swap)       (Pacer deadlines)   (.y4m / .mp4)
//! ```
//!
//! Each `start()`/`stop()` session produces one segment under
//! `<storage_root>/<source>/`, written as `recording-<start>.<ext>.part` and
//! renamed to `<start_ms>-<end_ms>.<ext>` when it is finalized. When the
//! source is slower than the target rate the latest frame is written again
//! (frame repetition on stale source), which keeps segment duration equal to
//! wall-clock duration.
//!
//! A failed open or write finalizes the current segment, waits
//! `error_backoff`, and opens a fresh one. After `max_consecutive_failures`
//! the recorder gives up and returns to idle.

pub mod config;
pub mod observer;
pub mod pacing;
pub mod segment;
mod state;
mod worker;
pub mod writer;

pub use config::RecorderConfig;
pub use observer::{ObserverId, RecordingObserver};
pub use pacing::{PaceOutcome, Pacer};
pub use segment::{
    epoch_millis, parse_segment_file_name, segment_file_name, FinalizedSegment, Segment,
};
pub use state::Recorder;
pub use writer::{FfmpegWriter, SegmentWriter, WriterFactory, WriterKind, Y4mWriter};
