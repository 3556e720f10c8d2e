//! Per-viewer session
//!
//! One session per accepted connection. Each iteration waits on the hub for
//! the next frame and writes it length-prefixed. Any socket error ends the
//! session; the caller treats that as a normal disconnect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::hub::FrameSubscriber;
use crate::protocol::{encode_keep_alive, write_frame, LENGTH_PREFIX_SIZE};

use super::listener::ServerCounters;

/// Server side of one viewer connection
pub struct ClientSession<S> {
    session_id: u64,
    peer: SocketAddr,
    socket: S,
    subscriber: FrameSubscriber,
    keep_alive: Duration,
    counters: Arc<ServerCounters>,
    frames_sent: u64,
}

impl<S> ClientSession<S>
where
    S: AsyncWrite + Unpin,
{
    pub(crate) fn new(
        session_id: u64,
        peer: SocketAddr,
        socket: S,
        subscriber: FrameSubscriber,
        keep_alive: Duration,
        counters: Arc<ServerCounters>,
    ) -> Self {
        Self {
            session_id,
            peer,
            socket,
            subscriber,
            keep_alive,
            counters,
            frames_sent: 0,
        }
    }

    /// Session id assigned by the listener
    pub fn id(&self) -> u64 {
        self.session_id
    }

    /// Stream frames until the socket fails or the hub goes away
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(session_id = self.session_id, peer = %self.peer, "Viewer connected");

        let result = self.stream().await;

        tracing::info!(
            session_id = self.session_id,
            peer = %self.peer,
            frames = self.frames_sent,
            skipped = self.subscriber.skipped(),
            "Viewer disconnected"
        );
        result
    }

    async fn stream(&mut self) -> Result<()> {
        loop {
            let next = if self.keep_alive.is_zero() {
                Some(self.subscriber.wait_for_next().await)
            } else {
                tokio::time::timeout(self.keep_alive, self.subscriber.wait_for_next())
                    .await
                    .ok()
            };

            let frame = match next {
                Some(Some(frame)) => frame,
                // Hub dropped
                Some(None) => return Ok(()),
                None => {
                    self.socket.write_all(&encode_keep_alive()).await?;
                    tracing::trace!(session_id = self.session_id, "Keep-alive sent");
                    continue;
                }
            };

            if frame.is_empty() {
                continue;
            }

            write_frame(&mut self.socket, &frame).await?;

            self.frames_sent += 1;
            self.counters.frame_sent(frame.len() + LENGTH_PREFIX_SIZE);
        }
    }
}
