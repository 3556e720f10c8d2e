//! Relay server
//!
//! ```text
//! capture subprocess ──stdout──► JpegExtractor ──► FrameHub
//!                                                    │
//!                         ┌──────────────────────────┼──────────────┐
//!                         ▼                          ▼              ▼
//!                  ClientSession #1          ClientSession #2      ...
//!                  [len][jpeg] ──► TCP       [len][jpeg] ──► TCP
//! ```

pub mod config;
pub mod listener;
pub mod session;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use listener::RelayServer;
pub use session::ClientSession;
