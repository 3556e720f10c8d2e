//! Recording segments
//!
//! A segment is written under a provisional name and renamed to
//! `<start_ms>-<end_ms>.<ext>` when it is finalized. Provisional names live in
//! the per-source directory, so concurrent sources never collide.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RecorderError, Result};
use crate::media::RasterFrame;
use crate::stats::SegmentStats;

use super::writer::{SegmentWriter, WriterFactory};

/// Current wall-clock time in epoch milliseconds
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Final file name of a segment
pub fn segment_file_name(start_ms: i64, end_ms: i64, extension: &str) -> String {
    format!("{}-{}.{}", start_ms, end_ms, extension)
}

/// Provisional file name while a segment is being written
pub fn provisional_file_name(start_ms: i64, extension: &str) -> String {
    format!("recording-{}.{}.part", start_ms, extension)
}

/// Parse `<start>-<end>.<ext>` back into its timestamps
pub fn parse_segment_file_name(name: &str) -> Option<(i64, i64, &str)> {
    let (stem, ext) = name.split_once('.')?;
    let (start, end) = stem.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, ext))
}

/// A segment being written
pub struct Segment {
    dir: PathBuf,
    provisional: PathBuf,
    extension: String,
    writer: Option<Box<dyn SegmentWriter>>,
    stats: SegmentStats,
}

/// A segment that has been closed and renamed
#[derive(Debug, Clone)]
pub struct FinalizedSegment {
    pub path: PathBuf,
    pub stats: SegmentStats,
}

impl Segment {
    /// Create `dir` if needed and open a writer for `dimensions`
    pub fn open(
        dir: &Path,
        factory: &dyn WriterFactory,
        dimensions: (u32, u32),
        fps: u32,
    ) -> Result<Self> {
        fs::create_dir_all(dir).map_err(RecorderError::WriterOpen)?;

        let start_ms = epoch_millis();
        let extension = factory.extension().to_string();
        let provisional = dir.join(provisional_file_name(start_ms, &extension));
        let writer = factory.open(&provisional, dimensions.0, dimensions.1, fps)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            provisional,
            extension,
            writer: Some(writer),
            stats: SegmentStats {
                start_ms,
                width: dimensions.0,
                height: dimensions.1,
                ..Default::default()
            },
        })
    }

    /// Write one frame. `repeated` marks a re-write of the previous frame.
    pub fn write(&mut self, frame: &RasterFrame, repeated: bool) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            RecorderError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "segment already closed",
            ))
        })?;

        writer.write_frame(frame)?;
        self.stats.frames_written += 1;
        if repeated {
            self.stats.repeated_frames += 1;
        }
        Ok(())
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.stats.frames_written
    }

    /// Path being written
    pub fn provisional_path(&self) -> &Path {
        &self.provisional
    }

    /// Close the writer and rename to the final name
    ///
    /// The rename happens even when closing the writer fails or no frames were
    /// written, so no provisional file is left behind.
    pub fn finalize(mut self) -> Result<FinalizedSegment> {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finish() {
                tracing::error!(
                    path = %self.provisional.display(),
                    error = %e,
                    "Error closing segment writer"
                );
            }
        }

        // Names must satisfy start < end even for sub-millisecond segments
        let end_ms = epoch_millis().max(self.stats.start_ms + 1);
        self.stats.end_ms = end_ms;

        let name = segment_file_name(self.stats.start_ms, end_ms, &self.extension);
        let path = self.dir.join(&name);
        fs::rename(&self.provisional, &path).map_err(RecorderError::Write)?;

        Ok(FinalizedSegment {
            path,
            stats: self.stats.clone(),
        })
    }
}
