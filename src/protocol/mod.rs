//! Wire protocol
//!
//! Server to viewer, one TCP connection per viewer, repeating:
//!
//! ```text
//! +----------------------+---------------------------+
//! | Length (4 bytes, BE) | JPEG payload (Length B)   |
//! +----------------------+---------------------------+
//! ```
//!
//! A length of zero is a keep-alive and carries no payload. There is no other
//! framing, compression or sequence numbering.

pub mod framing;

pub use framing::{
    decode_frame, encode_frame, encode_keep_alive, read_frame, write_frame, WireFrame,
    LENGTH_PREFIX_SIZE,
};
