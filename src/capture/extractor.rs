//! JPEG frame extraction from a raw MJPEG byte stream
//!
//! Chunks arrive in arbitrary sizes. Each push appends to an internal buffer
//! and scans for a start-of-image marker followed by an end-of-image marker;
//! the bytes between them (inclusive) form one frame and the buffer keeps only
//! what follows the end marker.
//!
//! ```text
//!  buffer:  junk | FF D8 ... FF D9 | tail
//!                 └──── frame ────┘  └─ kept for the next push
//! ```
//!
//! At most one frame is emitted per push; a chunk holding several complete
//! frames leaves the rest for the following pushes.
//!
//! Scanning is incremental. Once a start marker is found the junk before it is
//! dropped, and each later push only searches the newly appended bytes (plus
//! one byte of overlap for a marker split across chunks).
//!
//! The buffer is capped at `max_buffer_size`. Without a cap a stream that never
//! produces an end marker would grow the buffer forever. On overflow everything
//! before the last start marker is dropped, or the whole buffer if that is
//! still too large.

use bytes::BytesMut;

use crate::media::{EncodedFrame, EOI_MARKER, SOI_MARKER};

/// Default buffer cap (8 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Incremental JPEG splitter
#[derive(Debug)]
pub struct JpegExtractor {
    buffer: BytesMut,
    max_buffer_size: usize,
    /// Buffer starts with a start marker
    in_frame: bool,
    /// Prefix of the buffer already searched for the next marker
    scanned: usize,
    frames: u64,
    discarded_bytes: u64,
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

fn rfind_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|w| w == marker)
}

impl JpegExtractor {
    /// Create an extractor with the default buffer cap
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_BUFFER_SIZE)
    }

    /// Create an extractor with a custom buffer cap
    pub fn with_max_buffer_size(max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            max_buffer_size,
            in_frame: false,
            scanned: 0,
            frames: 0,
            discarded_bytes: 0,
        }
    }

    /// Append a chunk and emit the first complete frame, if any
    pub fn push(&mut self, chunk: &[u8]) -> Option<EncodedFrame> {
        self.buffer.extend_from_slice(chunk);

        if let Some(frame) = self.scan() {
            return Some(frame);
        }

        if self.buffer.len() > self.max_buffer_size {
            self.shed();
        }
        None
    }

    fn scan(&mut self) -> Option<EncodedFrame> {
        if !self.in_frame {
            let from = self.scanned.saturating_sub(1);
            let Some(offset) = find_marker(&self.buffer[from..], SOI_MARKER) else {
                self.scanned = self.buffer.len();
                return None;
            };

            // Drop leading junk so the frame starts at 0
            let start = from + offset;
            if start > 0 {
                self.discarded_bytes += start as u64;
                let _ = self.buffer.split_to(start);
            }
            self.in_frame = true;
            self.scanned = 2;
        }

        let from = self.scanned.saturating_sub(1).max(2);
        let Some(offset) = find_marker(&self.buffer[from..], EOI_MARKER) else {
            self.scanned = self.buffer.len();
            return None;
        };

        let frame = self.buffer.split_to(from + offset + 2).freeze();
        self.in_frame = false;
        self.scanned = 0;
        self.frames += 1;

        Some(EncodedFrame::new(frame))
    }

    fn shed(&mut self) {
        let before = self.buffer.len();
        match rfind_marker(&self.buffer, SOI_MARKER) {
            Some(pos) if before - pos <= self.max_buffer_size && pos > 0 => {
                let _ = self.buffer.split_to(pos);
            }
            _ => {
                // Keep a trailing 0xFF: it may be the first half of a marker
                let keep_last = self.buffer.last() == Some(&0xFF);
                self.buffer.clear();
                if keep_last {
                    self.buffer.extend_from_slice(&[0xFF]);
                }
            }
        }

        // The kept bytes are searched again from the start
        self.in_frame = false;
        self.scanned = 0;

        let dropped = before - self.buffer.len();
        self.discarded_bytes += dropped as u64;
        tracing::warn!(
            dropped_bytes = dropped,
            max_buffer_size = self.max_buffer_size,
            "JPEG buffer overflow without end marker, discarding data"
        );
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Frames emitted so far
    pub fn frames_emitted(&self) -> u64 {
        self.frames
    }

    /// Bytes thrown away (junk before markers and overflow)
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }
}

impl Default for JpegExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> (Vec<u8>, Vec<u8>) {
        let mut frame = vec![0xFF, 0xD8];
        frame.extend_from_slice(&[0x10, 0x20, 0xFF, 0x00, 0x30, 0x40]);
        frame.extend_from_slice(&[0xFF, 0xD9]);

        let mut stream = vec![0x01, 0x02, 0xFF, 0x03];
        stream.extend_from_slice(&frame);
        stream.extend_from_slice(&[0x55, 0x66]);
        (stream, frame)
    }

    #[test]
    fn test_single_chunk() {
        let (stream, frame) = sample_stream();
        let mut ex = JpegExtractor::new();

        let out = ex.push(&stream).unwrap();
        assert_eq!(out.data().as_ref(), frame.as_slice());
        assert_eq!(ex.buffered(), 2); // tail
        assert_eq!(ex.discarded_bytes(), 4);
    }

    #[test]
    fn test_every_two_way_split() {
        let (stream, frame) = sample_stream();

        for split in 0..=stream.len() {
            let mut ex = JpegExtractor::new();
            let mut emitted = Vec::new();
            emitted.extend(ex.push(&stream[..split]));
            emitted.extend(ex.push(&stream[split..]));

            assert_eq!(emitted.len(), 1, "split at {}", split);
            assert_eq!(emitted[0].data().as_ref(), frame.as_slice());
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let (stream, frame) = sample_stream();
        let mut ex = JpegExtractor::new();

        let emitted: Vec<_> = stream.iter().filter_map(|b| ex.push(&[*b])).collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].data().as_ref(), frame.as_slice());
    }

    #[test]
    fn test_one_frame_per_push() {
        let a = [0xFF, 0xD8, 0xAA, 0xFF, 0xD9];
        let b = [0xFF, 0xD8, 0xBB, 0xFF, 0xD9];
        let mut chunk = a.to_vec();
        chunk.extend_from_slice(&b);

        let mut ex = JpegExtractor::new();
        assert_eq!(ex.push(&chunk).unwrap().data().as_ref(), &a);
        // Second frame waits for the next push, even an empty one
        assert_eq!(ex.push(&[]).unwrap().data().as_ref(), &b);
        assert!(ex.push(&[]).is_none());
        assert_eq!(ex.frames_emitted(), 2);
    }

    #[test]
    fn test_markers_split_across_chunks() {
        let mut ex = JpegExtractor::new();

        // Junk, then a start marker split over two pushes
        assert!(ex.push(&[0x00, 0x11, 0xFF]).is_none());
        assert!(ex.push(&[0xD8, 0x01, 0x02]).is_none());
        // Body keeps arriving; the end marker is split over two pushes
        assert!(ex.push(&[0x03, 0xFF, 0x00, 0x04]).is_none());
        assert!(ex.push(&[0x05, 0xFF]).is_none());
        let out = ex.push(&[0xD9, 0xAB]).unwrap();

        assert_eq!(
            out.data().as_ref(),
            &[0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0x00, 0x04, 0x05, 0xFF, 0xD9]
        );
        assert_eq!(ex.discarded_bytes(), 2);
        assert_eq!(ex.buffered(), 1);

        // The cursor starts over for the next frame
        assert!(ex.push(&[0xFF]).is_none());
        assert!(ex.push(&[0xD8, 0xFF]).is_none());
        let out = ex.push(&[0xD9]).unwrap();
        assert_eq!(out.data().as_ref(), &[0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(ex.discarded_bytes(), 3);
    }

    #[test]
    fn test_large_frame_in_small_chunks() {
        let mut frame = vec![0xFF, 0xD8];
        frame.extend((0..400 * 1024).map(|i| (i % 251) as u8 & 0x7F));
        frame.extend_from_slice(&[0xFF, 0xD9]);

        let mut ex = JpegExtractor::new();
        let mut emitted = Vec::new();
        for _ in 0..3 {
            for chunk in frame.chunks(4096) {
                emitted.extend(ex.push(chunk));
            }
        }

        assert_eq!(emitted.len(), 3);
        assert!(emitted.iter().all(|f| f.data().as_ref() == frame.as_slice()));
        assert_eq!(ex.buffered(), 0);
        assert_eq!(ex.discarded_bytes(), 0);
    }

    #[test]
    fn test_stray_end_marker_before_start() {
        let mut ex = JpegExtractor::new();
        let out = ex
            .push(&[0xFF, 0xD9, 0x00, 0xFF, 0xD8, 0x01, 0xFF, 0xD9])
            .unwrap();
        assert_eq!(out.data().as_ref(), &[0xFF, 0xD8, 0x01, 0xFF, 0xD9]);
    }

    #[test]
    fn test_missing_end_marker_buffers() {
        let mut ex = JpegExtractor::new();
        assert!(ex.push(&[0xFF, 0xD8, 1, 2, 3]).is_none());
        assert!(ex.push(&[4, 5, 6]).is_none());
        assert_eq!(ex.buffered(), 8);

        let out = ex.push(&[0xFF, 0xD9]).unwrap();
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_overflow_keeps_last_start_marker() {
        let mut ex = JpegExtractor::with_max_buffer_size(16);
        assert!(ex.push(&[0xFF, 0xD8, 0, 0, 0, 0, 0, 0, 0, 0]).is_none());
        // Pushes the buffer over the cap with a newer start marker inside
        assert!(ex.push(&[0, 0, 0, 0, 0xFF, 0xD8, 7, 7]).is_none());
        assert_eq!(ex.buffered(), 4);

        let out = ex.push(&[0xFF, 0xD9]).unwrap();
        assert_eq!(out.data().as_ref(), &[0xFF, 0xD8, 7, 7, 0xFF, 0xD9]);
    }

    #[test]
    fn test_overflow_without_marker_clears() {
        let mut ex = JpegExtractor::with_max_buffer_size(8);
        assert!(ex.push(&[1; 9]).is_none());
        assert_eq!(ex.buffered(), 0);
        assert_eq!(ex.discarded_bytes(), 9);
    }
}
