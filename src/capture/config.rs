//! Capture subprocess configuration

use super::extractor::DEFAULT_MAX_BUFFER_SIZE;

/// How to launch and read the camera subprocess
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Program to run
    pub program: String,

    /// Program arguments
    pub args: Vec<String>,

    /// Bytes requested per stdout read
    pub read_chunk_size: usize,

    /// Cap on bytes buffered while waiting for an end-of-image marker
    pub max_buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_command_line(
            "libcamera-vid --inline --nopreview -t 0 --codec mjpeg --width 1920 --height 1080 -o -",
        )
        .unwrap_or_else(|| Self::new("libcamera-vid"))
    }
}

impl CaptureConfig {
    /// Create a config for a program with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            read_chunk_size: 4096,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Split a whitespace-separated command line. Returns `None` if empty.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    /// Replace the argument list
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the stdout read size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set the buffer cap
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Command line as a single string, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
