//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::capture::CaptureConfig;

/// Default relay port
pub const DEFAULT_PORT: u16 = 8000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent viewers (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Send a zero-length frame after this long without a new frame
    /// (zero disables keep-alives)
    pub keep_alive_interval: Duration,

    /// Camera subprocess
    pub capture: CaptureConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are written whole; don't hold them back
            keep_alive_interval: Duration::from_secs(5),
            capture: CaptureConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the keep-alive interval
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the capture subprocess
    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
        assert_eq!(config.keep_alive_interval, Duration::from_secs(5));
        assert_eq!(config.capture.program, "libcamera-vid");
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8001);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(4)
            .tcp_nodelay(false)
            .keep_alive_interval(Duration::ZERO)
            .capture(CaptureConfig::new("cat").args(["/dev/null"]));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 4);
        assert!(!config.tcp_nodelay);
        assert!(config.keep_alive_interval.is_zero());
        assert_eq!(config.capture.command_line(), "cat /dev/null");
    }
}
