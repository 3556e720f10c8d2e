//! Relay server listener
//!
//! Owns the capture subprocess and the frame hub, accepts viewer connections,
//! and spawns one [`ClientSession`] per viewer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::capture::{log_stderr, run_capture, CaptureProcess};
use crate::error::Result;
use crate::hub::FrameHub;
use crate::server::config::ServerConfig;
use crate::server::session::ClientSession;
use crate::stats::ServerStats;

/// Connection and traffic counters shared with sessions
#[derive(Debug, Default)]
pub(crate) struct ServerCounters {
    pub(crate) total_connections: AtomicU64,
    pub(crate) active_connections: AtomicU64,
    pub(crate) frames_sent: AtomicU64,
    pub(crate) bytes_sent: AtomicU64,
}

impl ServerCounters {
    pub(crate) fn frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

/// Decrements the active count when a session task ends or is aborted
struct ActiveConnection(Arc<ServerCounters>);

impl ActiveConnection {
    fn open(counters: &Arc<ServerCounters>) -> Self {
        counters.total_connections.fetch_add(1, Ordering::Relaxed);
        counters.active_connections.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counters))
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.0.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// MJPEG relay server
pub struct RelayServer {
    config: ServerConfig,
    hub: Arc<FrameHub>,
    counters: Arc<ServerCounters>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    started_at: Instant,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_hub(config, Arc::new(FrameHub::new()))
    }

    /// Create a server around an existing hub
    ///
    /// Useful when frames come from somewhere other than the configured
    /// subprocess; pair it with [`serve`](Self::serve).
    pub fn with_hub(config: ServerConfig, hub: Arc<FrameHub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            counters: Arc::new(ServerCounters::default()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            started_at: Instant::now(),
        }
    }

    /// Get a reference to the frame hub
    pub fn hub(&self) -> &Arc<FrameHub> {
        &self.hub
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Snapshot of server statistics
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.counters.total_connections.load(Ordering::Relaxed),
            active_connections: self.counters.active_connections.load(Ordering::Relaxed),
            frames_published: self.hub.published_count(),
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Run the server with graceful shutdown
    ///
    /// Binds the listener, launches the capture subprocess, and serves viewers
    /// until `shutdown` resolves or the capture stream ends. A capture failure
    /// is returned so the caller can restart or exit. The subprocess is
    /// terminated on every path.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        let mut capture = CaptureProcess::spawn(&self.config.capture)?;
        let stdout = match capture.take_stdout() {
            Ok(stdout) => stdout,
            Err(e) => {
                capture.terminate().await;
                return Err(e);
            }
        };

        let stderr_task = capture.take_stderr().map(|stderr| {
            let program = self.config.capture.program.clone();
            tokio::spawn(async move { log_stderr(stderr, &program).await })
        });

        let result = tokio::select! {
            result = self.serve(listener, shutdown) => result,
            result = run_capture(stdout, &self.hub, &self.config.capture) => {
                if let Err(ref e) = result {
                    tracing::error!(error = %e, "Capture pipeline stopped");
                }
                result
            }
        };

        capture.terminate().await;
        if let Some(task) = stderr_task {
            task.abort();
        }

        let stats = self.stats();
        tracing::info!(
            connections = stats.total_connections,
            frames_published = stats.frames_published,
            frames_sent = stats.frames_sent,
            "Relay server stopped"
        );

        result
    }

    /// Serve viewers on an already-bound listener until `shutdown` resolves
    ///
    /// Frames must be published to [`hub`](Self::hub) by the caller. All
    /// sessions are closed before this returns.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let mut sessions = JoinSet::new();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &mut sessions) => result,
        };

        sessions.shutdown().await;
        result
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        sessions: &mut JoinSet<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, sessions);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                // Reap finished sessions
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        sessions: &mut JoinSet<()>,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        // Generate session ID
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        // Configure socket
        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        // Subscribe before spawning so no frame published from here on is missed
        let subscriber = self.hub.subscribe();
        let active = ActiveConnection::open(&self.counters);
        let session = ClientSession::new(
            session_id,
            peer_addr,
            socket,
            subscriber,
            self.config.keep_alive_interval,
            Arc::clone(&self.counters),
        );

        sessions.spawn(async move {
            let _permit = permit;
            let _active = active;

            if let Err(e) = session.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Session ended by socket error"
                );
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
