//! Camera capture pipeline
//!
//! Subprocess stdout bytes are split into JPEG frames and published to the
//! frame hub.

pub mod config;
pub mod extractor;
pub mod process;

pub use config::CaptureConfig;
pub use extractor::JpegExtractor;
pub use process::{log_stderr, run_capture, CaptureProcess, LineSeverity};
