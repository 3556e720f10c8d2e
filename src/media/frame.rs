//! Encoded and decoded frame types

use bytes::Bytes;

/// A single JPEG-encoded frame
///
/// Cheap to clone: the payload is reference counted, so every client session
/// shares the same allocation. Once published a frame is never mutated; newer
/// frames replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFrame {
    data: Bytes,
}

impl EncodedFrame {
    /// Wrap JPEG bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Frame payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the frame, returning its payload
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for EncodedFrame {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for EncodedFrame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for EncodedFrame {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

/// A decoded image with fixed geometry
///
/// Pixels are stored row-major, interleaved, `channels` bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl RasterFrame {
    /// Create an RGB8 frame. Returns `None` when `data` does not match the geometry.
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            channels: 3,
            data,
        })
    }

    /// Solid-colour RGB8 frame
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            channels: 3,
            data,
        }
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
