//! Length-prefixed frame codec
//!
//! Both a buffer-oriented codec (`encode_frame`/`decode_frame`) and async
//! stream helpers (`read_frame`/`write_frame`). Stream reads accumulate until
//! the exact byte count is satisfied or the peer closes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::media::EncodedFrame;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A decoded wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// Zero-length frame: no payload, connection stays open
    KeepAlive,
    /// JPEG payload
    Jpeg(EncodedFrame),
}

impl WireFrame {
    /// Payload length as carried in the prefix
    pub fn len(&self) -> usize {
        match self {
            WireFrame::KeepAlive => 0,
            WireFrame::Jpeg(frame) => frame.len(),
        }
    }

    /// Whether this is a keep-alive
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, WireFrame::KeepAlive)
    }
}

fn prefix_for(len: usize) -> std::result::Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::FrameTooLarge(len))
}

/// Encode a payload with its length prefix into one contiguous buffer
pub fn encode_frame(payload: &[u8]) -> std::result::Result<Bytes, ProtocolError> {
    let len = prefix_for(payload.len())?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Encode a keep-alive (zero length, no payload)
pub fn encode_keep_alive() -> Bytes {
    Bytes::from_static(&[0, 0, 0, 0])
}

/// Decode one frame from the front of `buf`
///
/// Returns `None` when `buf` does not yet hold a complete frame; nothing is
/// consumed in that case.
pub fn decode_frame(buf: &mut BytesMut) -> Option<WireFrame> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return None;
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if buf.len() < LENGTH_PREFIX_SIZE + len {
        return None;
    }

    buf.advance(LENGTH_PREFIX_SIZE);
    if len == 0 {
        return Some(WireFrame::KeepAlive);
    }

    let payload = buf.split_to(len).freeze();
    Some(WireFrame::Jpeg(EncodedFrame::new(payload)))
}

/// Fill `buf` completely, tolerating short reads
///
/// Returns the number of bytes read, which is less than `buf.len()` only if
/// the peer closed the stream.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read one frame from a stream
///
/// Returns `Ok(None)` if the peer closed cleanly between frames, and
/// `ProtocolError::ConnectionClosed` if it closed partway through one.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<WireFrame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    match read_full(reader, &mut header).await? {
        0 => return Ok(None),
        LENGTH_PREFIX_SIZE => {}
        _ => return Err(ProtocolError::ConnectionClosed.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Ok(Some(WireFrame::KeepAlive));
    }

    let mut payload = vec![0u8; len];
    if read_full(reader, &mut payload).await? < len {
        return Err(ProtocolError::ConnectionClosed.into());
    }

    Ok(Some(WireFrame::Jpeg(EncodedFrame::new(payload))))
}

/// Write one frame to a stream
///
/// The payload is written straight from the shared buffer, without copying it
/// behind the prefix.
pub async fn write_frame<W>(writer: &mut W, frame: &EncodedFrame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = prefix_for(frame.len())?;
    writer.write_all(&len.to_be_bytes()).await?;
    if len > 0 {
        writer.write_all(frame.data()).await?;
    }
    Ok(())
}
