//! Viewer supervisor
//!
//! Consumes control-channel events: starts one viewer per discovered server
//! and forwards recording commands to the recorders of every live viewer.
//! A stop additionally reaches any recorder that is still recording.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::control::{ControlEvent, RecordingCommand};
use crate::registry::{RecorderRegistry, SourceId};

use super::config::ViewerConfig;
use super::viewer::{DisplaySink, LogDisplay, Viewer};

/// Builds a display for a newly started viewer
pub type DisplayFactory = Arc<dyn Fn(&SourceId) -> Box<dyn DisplaySink> + Send + Sync>;

/// Runs one viewer task per discovered server
pub struct ViewerSupervisor {
    config: ViewerConfig,
    registry: Arc<RecorderRegistry>,
    display: DisplayFactory,
    viewers: HashMap<SourceId, JoinHandle<()>>,
}

impl ViewerSupervisor {
    /// Create a supervisor whose viewers record through `registry`
    pub fn new(config: ViewerConfig, registry: Arc<RecorderRegistry>) -> Self {
        Self {
            config,
            registry,
            display: Arc::new(|_: &SourceId| Box::new(LogDisplay::default()) as Box<dyn DisplaySink>),
            viewers: HashMap::new(),
        }
    }

    /// Use a custom display for new viewers
    pub fn with_display(mut self, display: DisplayFactory) -> Self {
        self.display = display;
        self
    }

    pub fn registry(&self) -> &Arc<RecorderRegistry> {
        &self.registry
    }

    /// Sources whose viewer task is still running, sorted
    pub fn active_sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<_> = self
            .viewers
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .map(|(source, _)| source.clone())
            .collect();
        sources.sort();
        sources
    }

    /// Whether a live viewer exists for `source`
    pub fn is_viewing(&self, source: &SourceId) -> bool {
        self.viewers
            .get(source)
            .is_some_and(|task| !task.is_finished())
    }

    /// Handle events until the channel closes, then shut down
    pub async fn run(mut self, mut events: mpsc::Receiver<ControlEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        tracing::info!("Control channel closed");
        self.shutdown().await;
    }

    /// Handle one control event
    pub async fn handle(&mut self, event: ControlEvent) {
        tracing::debug!(event = ?event, "Control event");
        match event {
            ControlEvent::ServerDiscovered(server) => self.start_viewer(server),
            ControlEvent::Recording(command) => self.dispatch(command).await,
        }
    }

    fn start_viewer(&mut self, server: String) {
        let source = SourceId::new(server.as_str());

        if let Some(task) = self.viewers.get(&source) {
            if !task.is_finished() {
                tracing::info!(source = %source, "Viewer already running");
                return;
            }
            tracing::warn!(source = %source, "Replacing finished viewer");
            self.viewers.remove(&source);
        }

        let registry = Arc::clone(&self.registry);
        let display = (self.display)(&source);
        let config = self.config.clone();
        let task_source = source.clone();

        let task = tokio::spawn(async move {
            let recorder = registry.get_or_create(&task_source).await;
            match Viewer::connect(&server, recorder, display, config).await {
                Ok(viewer) => {
                    viewer.run().await;
                }
                Err(e) => {
                    tracing::error!(source = %task_source, error = %e, "Viewer failed to connect");
                }
            }
        });

        tracing::info!(source = %source, "Started viewer");
        self.viewers.insert(source, task);
    }

    async fn dispatch(&mut self, command: RecordingCommand) {
        let mut sources = self.active_sources();
        // A stop also reaches recorders whose viewer has gone away
        if command == RecordingCommand::Stop {
            for source in self.registry.recording_sources().await {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }
        if sources.is_empty() {
            tracing::warn!(command = %command, "No active viewers to send command to");
            return;
        }

        for source in sources {
            match self.registry.apply(&source, command).await {
                Ok(changed) => {
                    tracing::info!(source = %source, command = %command, changed, "Sent command to viewer");
                }
                Err(e) => {
                    tracing::error!(source = %source, command = %command, error = %e, "Command failed");
                }
            }
        }
    }

    /// Abort every viewer and stop every recorder
    pub async fn shutdown(&mut self) {
        for (source, task) in self.viewers.drain() {
            task.abort();
            let _ = task.await;
            tracing::debug!(source = %source, "Viewer stopped");
        }
        self.registry.stop_all().await;
    }
}
