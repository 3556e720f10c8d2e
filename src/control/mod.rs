//! Control-channel vocabulary
//!
//! The discovery/command transport itself lives outside this crate. It hands
//! the viewer side two kinds of events: a server address to connect to, and a
//! recording command.

pub mod discovery;

pub use discovery::reachable_ip;

/// Normalized recording command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingCommand {
    Start,
    Stop,
}

impl RecordingCommand {
    /// Parse a command payload
    ///
    /// Accepts `start`/`true`/`recording_start` and `stop`/`false`/
    /// `recording_stop`, ignoring case and surrounding whitespace. Anything
    /// else is logged and ignored.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.trim().to_ascii_lowercase().as_str() {
            "start" | "true" | "recording_start" => Some(RecordingCommand::Start),
            "stop" | "false" | "recording_stop" => Some(RecordingCommand::Stop),
            _ => {
                tracing::info!(payload = %payload, "Unknown recording command ignored");
                None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingCommand::Start => "start",
            RecordingCommand::Stop => "stop",
        }
    }
}

impl std::fmt::Display for RecordingCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event delivered by the control channel to the viewer side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A server answered discovery with its reachable address
    ServerDiscovered(String),
    /// Start or stop recording on every connected source
    Recording(RecordingCommand),
}
