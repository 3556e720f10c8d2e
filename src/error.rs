//! Error types
//!
//! One top-level [`Error`] with per-area sub-errors. Socket write failures in
//! client sessions are surfaced as [`Error::Io`] and treated as a normal end of
//! that session by the caller.

use std::fmt;
use std::io;

use crate::registry::SourceId;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file, pipe)
    Io(io::Error),
    /// Wire protocol error
    Protocol(ProtocolError),
    /// Capture pipeline error
    Capture(CaptureError),
    /// Recorder error
    Recorder(RecorderError),
    /// JPEG decode failure
    Decode(String),
}

/// Wire protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not fit in a 32-bit length prefix
    FrameTooLarge(usize),
    /// Peer closed the connection in the middle of a frame
    ConnectionClosed,
    /// Operation requires an established connection
    NotConnected,
}

/// Capture pipeline errors
#[derive(Debug)]
pub enum CaptureError {
    /// Subprocess could not be launched
    Spawn(io::Error),
    /// Subprocess was launched without a piped stdout
    MissingStdout,
    /// Upstream byte stream reached end-of-file
    StreamEnded,
}

/// Recorder errors
#[derive(Debug)]
pub enum RecorderError {
    /// No raster frame has arrived yet, so the segment size is unknown
    NoFrame(SourceId),
    /// Writer could not be opened
    WriterOpen(io::Error),
    /// Writer failed while writing or finishing a segment
    Write(io::Error),
    /// Frame dimensions differ from the segment's dimensions
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Encoder process exited unsuccessfully
    WriterProcess(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Recorder(e) => write!(f, "Recorder error: {}", e),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::FrameTooLarge(len) => {
                write!(f, "Frame of {} bytes exceeds 32-bit length prefix", len)
            }
            ProtocolError::ConnectionClosed => write!(f, "Connection closed mid-frame"),
            ProtocolError::NotConnected => write!(f, "Not connected"),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Spawn(e) => write!(f, "Failed to spawn capture process: {}", e),
            CaptureError::MissingStdout => write!(f, "Capture process has no stdout pipe"),
            CaptureError::StreamEnded => write!(f, "Capture stream ended"),
        }
    }
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderError::NoFrame(source) => {
                write!(f, "No frame received yet for source {}", source)
            }
            RecorderError::WriterOpen(e) => write!(f, "Failed to open segment writer: {}", e),
            RecorderError::Write(e) => write!(f, "Segment write failed: {}", e),
            RecorderError::DimensionMismatch { expected, actual } => write!(
                f,
                "Frame is {}x{}, segment is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            RecorderError::WriterProcess(msg) => write!(f, "Encoder process failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Capture(CaptureError::Spawn(e)) => Some(e),
            Error::Recorder(RecorderError::WriterOpen(e) | RecorderError::Write(e)) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ProtocolError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecorderError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Error::Capture(e)
    }
}

impl From<RecorderError> for Error {
    fn from(e: RecorderError) -> Self {
        Error::Recorder(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::from(ProtocolError::FrameTooLarge(5));
        assert!(e.to_string().contains("5 bytes"));

        let e = Error::from(CaptureError::StreamEnded);
        assert_eq!(e.to_string(), "Capture error: Capture stream ended");

        let e = Error::from(RecorderError::DimensionMismatch {
            expected: (640, 480),
            actual: (320, 240),
        });
        assert!(e.to_string().contains("320x240"));
        assert!(e.to_string().contains("640x480"));
    }

    #[test]
    fn test_io_source_preserved() {
        let e = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
