//! Viewer side
//!
//! Provides the client half of the relay:
//! - [`StreamReceiver`]: connects to a relay server and reads frames
//! - [`Viewer`]: decodes frames, feeds the source's recorder, throttles display
//! - [`ViewerSupervisor`]: one viewer per discovered server, recording commands

pub mod config;
pub mod receiver;
pub mod supervisor;
pub mod viewer;

pub use config::ViewerConfig;
pub use receiver::StreamReceiver;
pub use supervisor::{DisplayFactory, ViewerSupervisor};
pub use viewer::{DisplaySink, LogDisplay, NullDisplay, Viewer, ViewerSummary};
