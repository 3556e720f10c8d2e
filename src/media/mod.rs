//! Frame types and JPEG decoding
//!
//! This module provides:
//! - `EncodedFrame`: one JPEG image as it travels through the hub and the wire
//! - `RasterFrame`: a decoded RGB8 image handed to recorders and displays
//! - JPEG marker constants and decoding

pub mod frame;
pub mod jpeg;

pub use frame::{EncodedFrame, RasterFrame};
pub use jpeg::{decode_jpeg, EOI_MARKER, SOI_MARKER};
