//! Viewer configuration

use std::time::Duration;

use crate::server::DEFAULT_PORT;

/// Viewer configuration options
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Relay port on the discovered server
    pub stream_port: u16,

    /// Hand every n-th decoded frame to the display (recording sees all)
    pub display_interval: u32,

    /// Give up connecting after this long
    pub connect_timeout: Duration,

    /// Frames taking longer than this to decode and hand off are logged
    pub slow_frame_threshold: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            stream_port: DEFAULT_PORT,
            display_interval: 4,
            connect_timeout: Duration::from_secs(5),
            slow_frame_threshold: Duration::from_millis(33), // One frame at 30 fps
        }
    }
}

impl ViewerConfig {
    /// Set the relay port
    pub fn stream_port(mut self, port: u16) -> Self {
        self.stream_port = port;
        self
    }

    /// Set the display interval (at least 1)
    pub fn display_interval(mut self, interval: u32) -> Self {
        self.display_interval = interval.max(1);
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the slow frame threshold
    pub fn slow_frame_threshold(mut self, threshold: Duration) -> Self {
        self.slow_frame_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();

        assert_eq!(config.stream_port, 8000);
        assert_eq!(config.display_interval, 4);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.slow_frame_threshold, Duration::from_millis(33));
    }

    #[test]
    fn test_display_interval_minimum() {
        let config = ViewerConfig::default().display_interval(0);
        assert_eq!(config.display_interval, 1);
    }
}
