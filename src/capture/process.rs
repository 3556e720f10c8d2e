//! Camera subprocess management
//!
//! The subprocess writes MJPEG to stdout and diagnostics to stderr. Stdout is
//! driven through a [`JpegExtractor`] into the [`FrameHub`]; stderr is logged
//! line by line. End of stdout is fatal to capture and is returned to the
//! owner, which decides whether to restart or shut down.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::{CaptureError, Result};
use crate::hub::FrameHub;

use super::config::CaptureConfig;
use super::extractor::JpegExtractor;

/// Severity assigned to a subprocess stderr line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSeverity {
    Error,
    Warn,
    Info,
}

impl LineSeverity {
    /// `ERROR` anywhere in the line is an error, else `WARN` a warning
    pub fn sniff(line: &str) -> Self {
        if line.contains("ERROR") {
            LineSeverity::Error
        } else if line.contains("WARN") {
            LineSeverity::Warn
        } else {
            LineSeverity::Info
        }
    }
}

/// A running capture subprocess
pub struct CaptureProcess {
    child: Child,
    program: String,
}

impl CaptureProcess {
    /// Launch the subprocess with piped stdout and stderr
    ///
    /// The child is killed if this handle is dropped without `terminate`.
    pub fn spawn(config: &CaptureConfig) -> Result<Self> {
        let child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        tracing::info!(
            command = %config.command_line(),
            pid = ?child.id(),
            "Started capture process"
        );

        Ok(Self {
            child,
            program: config.program.clone(),
        })
    }

    /// Take the stdout pipe
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        Ok(self.child.stdout.take().ok_or(CaptureError::MissingStdout)?)
    }

    /// Take the stderr pipe, if still present
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// OS process id while running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the subprocess and reap it
    pub async fn terminate(mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::info!(program = %self.program, %status, "Capture process already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "Failed to poll capture process");
            }
        }

        if let Err(e) = self.child.kill().await {
            tracing::warn!(program = %self.program, error = %e, "Failed to kill capture process");
        } else {
            tracing::info!(program = %self.program, "Capture process terminated");
        }
    }
}

/// Read MJPEG from `reader` and publish every extracted frame to `hub`
///
/// Runs until the stream ends, which is always returned as
/// `CaptureError::StreamEnded`; read errors are returned as I/O errors.
pub async fn run_capture<R>(mut reader: R, hub: &FrameHub, config: &CaptureConfig) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut extractor = JpegExtractor::with_max_buffer_size(config.max_buffer_size);
    let mut chunk = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            tracing::warn!(
                frames = extractor.frames_emitted(),
                "Capture stream ended, terminating capture"
            );
            return Err(CaptureError::StreamEnded.into());
        }

        if let Some(frame) = extractor.push(&chunk[..n]) {
            let notified = hub.publish(frame);
            tracing::trace!(subscribers = notified, "Frame published");
        }
    }
}

/// Forward subprocess stderr to the log, one line at a time
pub async fn log_stderr<R>(reader: R, program: &str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                match LineSeverity::sniff(line) {
                    LineSeverity::Error => tracing::error!("[{}] {}", program, line),
                    LineSeverity::Warn => tracing::warn!("[{}] {}", program, line),
                    LineSeverity::Info => tracing::info!("[{}] {}", program, line),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Error reading capture stderr");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_severity_sniffing() {
        assert_eq!(LineSeverity::sniff("[0:01] ERROR: no camera"), LineSeverity::Error);
        assert_eq!(LineSeverity::sniff("WARN buffer low"), LineSeverity::Warn);
        assert_eq!(LineSeverity::sniff("#12 (30.00 fps)"), LineSeverity::Info);
        // Case sensitive, like the camera tool's own tags
        assert_eq!(LineSeverity::sniff("error in lowercase"), LineSeverity::Info);
    }

    #[tokio::test]
    async fn test_run_capture_publishes_and_reports_end() {
        let hub = Arc::new(FrameHub::new());
        let mut sub = hub.subscribe();
        let config = CaptureConfig::new("test").read_chunk_size(3);

        let mut stream = vec![0x00];
        stream.extend_from_slice(&[0xFF, 0xD8, 0x42, 0xFF, 0xD9]);
        let reader = std::io::Cursor::new(stream);

        let result = run_capture(reader, &hub, &config).await;
        assert!(matches!(result, Err(Error::Capture(CaptureError::StreamEnded))));

        let frame = sub.wait_for_next().await.unwrap();
        assert_eq!(frame.data().as_ref(), &[0xFF, 0xD8, 0x42, 0xFF, 0xD9]);
        assert_eq!(hub.published_count(), 1);
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let config = CaptureConfig::new("definitely-not-a-real-camera-binary");
        let result = CaptureProcess::spawn(&config);
        assert!(matches!(result, Err(Error::Capture(CaptureError::Spawn(_)))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_reads_subprocess_stdout() {
        let hub = FrameHub::new();
        let config = CaptureConfig::new("sh").args(["-c", r"printf '\377\330AB\377\331'"]);

        let mut process = CaptureProcess::spawn(&config).unwrap();
        let stdout = process.take_stdout().unwrap();

        let result = run_capture(stdout, &hub, &config).await;
        assert!(matches!(result, Err(Error::Capture(CaptureError::StreamEnded))));
        assert_eq!(
            hub.latest().unwrap().data().as_ref(),
            &[0xFF, 0xD8, b'A', b'B', 0xFF, 0xD9]
        );

        process.terminate().await;
    }
}
