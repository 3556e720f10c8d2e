//! Stream receiver
//!
//! Client end of the relay protocol: one TCP connection, length-prefixed
//! JPEG frames in, decoded raster frames out.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{Error, ProtocolError, Result};
use crate::media::{decode_jpeg, EncodedFrame, RasterFrame};
use crate::protocol::{self, WireFrame};
use crate::registry::SourceId;

/// Connection to one relay server
pub struct StreamReceiver {
    source: SourceId,
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl StreamReceiver {
    /// Receiver for `host:port`, identified by `source`
    pub fn new(source: SourceId, host: impl Into<String>, port: u16) -> Self {
        Self {
            source,
            host: host.into(),
            port,
            stream: None,
        }
    }

    /// Receiver for a discovered server, using its address as the source id
    pub fn for_server(server: &str, port: u16) -> Self {
        Self::new(SourceId::new(server), server, port)
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// Establish the connection; a no-op if already connected
    pub async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            tracing::debug!(source = %self.source, "Already connected");
            return Ok(());
        }

        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::error!(source = %self.source, port = self.port, error = %e, "Connection failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(source = %self.source, port = self.port, "Connection timed out");
                return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out").into());
            }
        };
        stream.set_nodelay(true)?;

        tracing::info!(
            source = %self.source,
            peer = %stream.peer_addr()?,
            "Connected to relay server"
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Whether a connection is open and still has a peer
    pub fn is_connected(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.peer_addr().is_ok())
    }

    /// Read one wire frame
    ///
    /// Returns `Ok(None)` when the server closed the connection. After `None`
    /// or an error the receiver is disconnected.
    pub async fn read_frame(&mut self) -> Result<Option<WireFrame>> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;

        let result = protocol::read_frame(stream).await;
        if !matches!(result, Ok(Some(_))) {
            self.stream = None;
        }
        result
    }

    /// Read until the next frame that decodes
    ///
    /// Keep-alives are skipped; so are frames that fail to decode, with a
    /// warning. Returns `Ok(None)` when the server closed the connection.
    pub async fn next_raster(&mut self) -> Result<Option<RasterFrame>> {
        loop {
            match self.read_frame().await? {
                None => return Ok(None),
                Some(WireFrame::KeepAlive) => continue,
                Some(WireFrame::Jpeg(frame)) => match decode(frame).await {
                    Ok(raster) => return Ok(Some(raster)),
                    Err(e) => {
                        tracing::warn!(source = %self.source, error = %e, "Frame decode failed");
                    }
                },
            }
        }
    }

    /// Close the connection
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(source = %self.source, "Disconnected");
        }
    }
}

/// Decode on the blocking pool; a 1080p JPEG takes several milliseconds
pub(crate) async fn decode(frame: EncodedFrame) -> Result<RasterFrame> {
    tokio::task::spawn_blocking(move || decode_jpeg(&frame))
        .await
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?
}
