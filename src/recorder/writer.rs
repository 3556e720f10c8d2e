//! Segment writers
//!
//! A segment writer receives raster frames at the pacing rate and produces one
//! media file. Two containers are provided:
//!
//! - [`Y4mWriter`]: YUV4MPEG2, 4:4:4, written directly. No external tools.
//! - [`FfmpegWriter`]: pipes raw `rgb24` into an `ffmpeg` process which
//!   encodes an MP4.
//!
//! YUV4MPEG2 layout:
//!
//! ```text
//! YUV4MPEG2 W<w> H<h> F<fps>:1 Ip A1:1 C444 XCOLORRANGE=FULL\n
//! FRAME\n <Y plane: w*h> <Cb plane: w*h> <Cr plane: w*h>
//! FRAME\n ...
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;

use crate::error::{RecorderError, Result};
use crate::media::RasterFrame;

/// Sink for the frames of one segment
pub trait SegmentWriter: Send {
    /// Append one frame
    fn write_frame(&mut self, frame: &RasterFrame) -> Result<()>;

    /// Flush and close the file
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Opens segment writers
pub trait WriterFactory: Send + Sync {
    /// File extension of produced segments, without the dot
    fn extension(&self) -> &str;

    /// Open a writer for a `width`x`height` stream at `fps`
    fn open(&self, path: &Path, width: u32, height: u32, fps: u32)
        -> Result<Box<dyn SegmentWriter>>;
}

/// Built-in writer choices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterKind {
    /// YUV4MPEG2 (`.y4m`)
    Y4m,
    /// MP4 through an external `ffmpeg`
    Ffmpeg {
        /// Path to the ffmpeg binary
        program: String,
        /// Video codec passed to `-c:v`
        codec: String,
    },
}

impl WriterKind {
    /// `ffmpeg` from `PATH`, encoding with `mpeg4`
    pub fn ffmpeg() -> Self {
        WriterKind::Ffmpeg {
            program: "ffmpeg".into(),
            codec: "mpeg4".into(),
        }
    }

    /// Build the factory for this kind
    pub fn factory(&self) -> Arc<dyn WriterFactory> {
        match self {
            WriterKind::Y4m => Arc::new(Y4mFactory),
            WriterKind::Ffmpeg { program, codec } => Arc::new(FfmpegFactory {
                program: program.clone(),
                codec: codec.clone(),
            }),
        }
    }
}

fn check_dimensions(expected: (u32, u32), frame: &RasterFrame) -> Result<()> {
    if frame.dimensions() != expected || frame.channels != 3 {
        return Err(RecorderError::DimensionMismatch {
            expected,
            actual: frame.dimensions(),
        }
        .into());
    }
    Ok(())
}

// ============================================================================
// YUV4MPEG2
// ============================================================================

struct Y4mFactory;

impl WriterFactory for Y4mFactory {
    fn extension(&self) -> &str {
        "y4m"
    }

    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn SegmentWriter>> {
        Ok(Box::new(Y4mWriter::create(path, width, height, fps)?))
    }
}

/// YUV4MPEG2 4:4:4 writer
pub struct Y4mWriter {
    out: BufWriter<File>,
    width: u32,
    height: u32,
    planes: Vec<u8>,
}

impl Y4mWriter {
    /// Create the file and write the stream header
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let file = File::create(path).map_err(RecorderError::WriterOpen)?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C444 XCOLORRANGE=FULL",
            width, height, fps
        )
        .map_err(RecorderError::WriterOpen)?;

        Ok(Self {
            out,
            width,
            height,
            planes: Vec::new(),
        })
    }
}

/// Full-range BT.601 RGB to YCbCr, planar output
fn rgb_to_planar_ycbcr(rgb: &[u8], pixels: usize, out: &mut Vec<u8>) {
    out.clear();
    out.resize(pixels * 3, 0);
    let (y_plane, rest) = out.split_at_mut(pixels);
    let (cb_plane, cr_plane) = rest.split_at_mut(pixels);

    for (i, px) in rgb.chunks_exact(3).take(pixels).enumerate() {
        let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
        let y = (77 * r + 150 * g + 29 * b + 128) >> 8;
        let cb = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
        let cr = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;
        y_plane[i] = y.clamp(0, 255) as u8;
        cb_plane[i] = cb.clamp(0, 255) as u8;
        cr_plane[i] = cr.clamp(0, 255) as u8;
    }
}

impl SegmentWriter for Y4mWriter {
    fn write_frame(&mut self, frame: &RasterFrame) -> Result<()> {
        check_dimensions((self.width, self.height), frame)?;

        rgb_to_planar_ycbcr(&frame.data, frame.pixel_count(), &mut self.planes);
        self.out
            .write_all(b"FRAME\n")
            .and_then(|_| self.out.write_all(&self.planes))
            .map_err(RecorderError::Write)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush().map_err(RecorderError::Write)?;
        self.out
            .get_ref()
            .sync_all()
            .map_err(RecorderError::Write)?;
        Ok(())
    }
}

// ============================================================================
// ffmpeg
// ============================================================================

struct FfmpegFactory {
    program: String,
    codec: String,
}

impl FfmpegFactory {
    fn command(&self, path: &Path, width: u32, height: u32, fps: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .arg("-loglevel")
            .arg("warning")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", width, height))
            .arg("-r")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg(&self.codec)
            .arg("-pix_fmt")
            .arg("yuv420p")
            // Provisional names don't end in .mp4, so name the muxer
            .arg("-f")
            .arg("mp4")
            .arg(path);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl WriterFactory for FfmpegFactory {
    fn extension(&self) -> &str {
        "mp4"
    }

    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn SegmentWriter>> {
        let mut child = self
            .command(path, width, height, fps)
            .spawn()
            .map_err(RecorderError::WriterOpen)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            RecorderError::WriterOpen(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "ffmpeg stdin not captured",
            ))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let program = self.program.clone();
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => tracing::warn!("[{}] {}", program, line),
                        Err(_) => break,
                    }
                }
            });
        }

        Ok(Box::new(FfmpegWriter {
            child,
            stdin: Some(stdin),
            width,
            height,
        }))
    }
}

/// Raw-video pipe into an `ffmpeg` encoder process
pub struct FfmpegWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
}

impl SegmentWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &RasterFrame) -> Result<()> {
        check_dimensions((self.width, self.height), frame)?;

        let stdin = self.stdin.as_mut().ok_or_else(|| {
            RecorderError::Write(io::Error::new(io::ErrorKind::BrokenPipe, "encoder closed"))
        })?;
        stdin.write_all(&frame.data).map_err(RecorderError::Write)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        // Closing stdin lets ffmpeg write the trailer and exit
        drop(self.stdin.take());

        let status = self.child.wait().map_err(RecorderError::Write)?;
        if !status.success() {
            return Err(RecorderError::WriterProcess(format!("ffmpeg exited with {}", status)).into());
        }
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            // Dropped without finish(): don't leave the encoder running
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
