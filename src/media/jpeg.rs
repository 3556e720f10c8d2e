//! JPEG markers and decoding

use image::ImageFormat;

use crate::error::{Error, Result};

use super::frame::{EncodedFrame, RasterFrame};

/// Start-of-image marker
pub const SOI_MARKER: [u8; 2] = [0xFF, 0xD8];

/// End-of-image marker
pub const EOI_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Decode a JPEG frame into an RGB8 raster
pub fn decode_jpeg(frame: &EncodedFrame) -> Result<RasterFrame> {
    if frame.is_empty() {
        return Err(Error::Decode("empty payload".into()));
    }

    let image = image::load_from_memory_with_format(frame.data(), ImageFormat::Jpeg)?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    RasterFrame::rgb(width, height, rgb.into_raw())
        .ok_or_else(|| Error::Decode("decoded buffer does not match dimensions".into()))
}

/// Encode a raster as JPEG. Used to build fixtures.
#[cfg(test)]
pub(crate) fn encode_jpeg(frame: &RasterFrame) -> EncodedFrame {
    use std::io::Cursor;

    let image = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .expect("raster geometry");
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("jpeg encode");
    EncodedFrame::new(out.into_inner())
}
