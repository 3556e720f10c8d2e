//! Viewer loop
//!
//! Reads frames from one relay server, hands every decoded frame to the
//! source's recorder, and shows every `display_interval`-th frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::media::{EncodedFrame, RasterFrame};
use crate::protocol::WireFrame;
use crate::recorder::Recorder;
use crate::registry::SourceId;

use super::config::ViewerConfig;
use super::receiver::{decode, StreamReceiver};

/// Where displayed frames go
pub trait DisplaySink: Send + Sync {
    /// Show one frame
    fn show(&mut self, source: &SourceId, frame: &RasterFrame);

    /// The stream ended
    fn close(&mut self, _source: &SourceId) {}
}

/// Discards frames
#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn show(&mut self, _source: &SourceId, _frame: &RasterFrame) {}
}

/// Logs displayed frames at debug level
#[derive(Debug, Default)]
pub struct LogDisplay {
    shown: u64,
}

impl LogDisplay {
    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySink for LogDisplay {
    fn show(&mut self, source: &SourceId, frame: &RasterFrame) {
        self.shown += 1;
        tracing::debug!(
            source = %source,
            width = frame.width,
            height = frame.height,
            shown = self.shown,
            "Frame displayed"
        );
    }

    fn close(&mut self, source: &SourceId) {
        tracing::info!(source = %source, shown = self.shown, "Display closed");
    }
}

/// Totals for one viewer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerSummary {
    /// Frames decoded and handed to the recorder
    pub frames: u64,
    /// Frames handed to the display
    pub displayed: u64,
    /// Frames that failed to decode
    pub decode_failures: u64,
}

/// One viewer: receiver, recorder hand-off and display
pub struct Viewer {
    receiver: StreamReceiver,
    recorder: Arc<Recorder>,
    display: Box<dyn DisplaySink>,
    config: ViewerConfig,
    summary: ViewerSummary,
}

impl Viewer {
    /// Wrap an already-connected receiver
    pub fn new(
        receiver: StreamReceiver,
        recorder: Arc<Recorder>,
        display: Box<dyn DisplaySink>,
        config: ViewerConfig,
    ) -> Self {
        Self {
            receiver,
            recorder,
            display,
            config,
            summary: ViewerSummary::default(),
        }
    }

    /// Connect to `server` on the configured port
    pub async fn connect(
        server: &str,
        recorder: Arc<Recorder>,
        display: Box<dyn DisplaySink>,
        config: ViewerConfig,
    ) -> Result<Self> {
        let mut receiver = StreamReceiver::new(recorder.source().clone(), server, config.stream_port);
        receiver.connect(config.connect_timeout).await?;
        Ok(Self::new(receiver, recorder, display, config))
    }

    pub fn source(&self) -> &SourceId {
        self.receiver.source()
    }

    /// Process frames until the connection ends
    ///
    /// A closed or broken connection is the normal way for a viewer to end and
    /// is not returned as an error.
    pub async fn run(mut self) -> ViewerSummary {
        loop {
            match self.receiver.read_frame().await {
                Ok(Some(WireFrame::KeepAlive)) => continue,
                Ok(Some(WireFrame::Jpeg(frame))) => self.process(frame).await,
                Ok(None) => {
                    tracing::warn!(source = %self.source(), "Connection lost");
                    break;
                }
                Err(e) => {
                    tracing::warn!(source = %self.source(), error = %e, "Frame receive failed");
                    break;
                }
            }
        }

        let source = self.receiver.source().clone();
        self.display.close(&source);
        self.receiver.disconnect();
        self.stop_recording(&source).await;

        tracing::info!(
            source = %source,
            frames = self.summary.frames,
            displayed = self.summary.displayed,
            decode_failures = self.summary.decode_failures,
            "Viewer finished"
        );
        self.summary
    }

    /// Finalize a recording fed by this stream; no new frames will arrive
    async fn stop_recording(&self, source: &SourceId) {
        if !self.recorder.is_recording() {
            return;
        }

        let recorder = Arc::clone(&self.recorder);
        match tokio::task::spawn_blocking(move || recorder.stop()).await {
            Ok(true) => tracing::info!(source = %source, "Recording stopped with the stream"),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(source = %source, error = %e, "Failed to stop recording");
            }
        }
    }

    async fn process(&mut self, frame: EncodedFrame) {
        let started = Instant::now();

        let raster = match decode(frame).await {
            Ok(raster) => raster,
            Err(e) => {
                self.summary.decode_failures += 1;
                tracing::warn!(source = %self.source(), error = %e, "Frame decode failed");
                return;
            }
        };
        let decode_time = started.elapsed();

        let update_started = Instant::now();
        self.recorder.update_frame(&raster);
        let update_time = update_started.elapsed();

        self.summary.frames += 1;
        let mut display_time = Duration::ZERO;
        if self.summary.frames % u64::from(self.config.display_interval.max(1)) == 0 {
            let display_started = Instant::now();
            let source = self.receiver.source().clone();
            self.display.show(&source, &raster);
            self.summary.displayed += 1;
            display_time = display_started.elapsed();
        }

        let total = started.elapsed();
        if total > self.config.slow_frame_threshold {
            tracing::debug!(
                source = %self.source(),
                total_ms = total.as_millis() as u64,
                decode_ms = decode_time.as_millis() as u64,
                update_ms = update_time.as_millis() as u64,
                display_ms = display_time.as_millis() as u64,
                "Frame processing too slow"
            );
        }
    }
}
