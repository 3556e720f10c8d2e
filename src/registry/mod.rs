//! Recorder registry
//!
//! Every source gets exactly one [`Recorder`](crate::recorder::Recorder). The
//! registry is created by whoever composes the process (the viewer
//! supervisor, a demo, a test) and shared by `Arc`.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<RecorderRegistry>
//!                ┌──────────────────────────────┐
//!                │ recorders: HashMap<SourceId, │
//!                │   Arc<Recorder>              │
//!                │ >                            │
//!                └──────────────┬───────────────┘
//!                               │ get_or_create()
//!          ┌────────────────────┼────────────────────┐
//!          ▼                    ▼                    ▼
//!     [Viewer A]           [Viewer B]          [Supervisor]
//!     update_frame()       update_frame()      apply(Start/Stop)
//! ```

pub mod key;
pub mod store;

pub use key::SourceId;
pub use store::RecorderRegistry;
