//! MJPEG relay
//!
//! Relays a live MJPEG elementary stream from a camera subprocess to any
//! number of viewers over a length-prefixed TCP protocol, and lets each viewer
//! record decoded frames into timestamped video segments.
//!
//! # Architecture
//!
//! ```text
//!  camera stdout ──► JpegExtractor ──► FrameHub ──► ClientSession ──► TCP
//!                                         │              ...
//!                                         └───────► ClientSession ──► TCP
//!
//!  TCP ──► StreamReceiver ──► decode ──┬──► Recorder (paced, every frame)
//!                                      └──► DisplaySink (every Nth frame)
//! ```
//!
//! # Example
//! ```no_run
//! use mjpeg_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> mjpeg_relay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod client;
pub mod control;
pub mod error;
pub mod hub;
pub mod media;
pub mod protocol;
pub mod recorder;
pub mod registry;
pub mod server;
pub mod stats;

pub use client::{StreamReceiver, Viewer, ViewerConfig, ViewerSupervisor};
pub use hub::FrameHub;
pub use media::{EncodedFrame, RasterFrame};
pub use recorder::{Recorder, RecorderConfig};
pub use registry::{RecorderRegistry, SourceId};
pub use server::{RelayServer, ServerConfig};
