//! Recorder registry implementation
//!
//! Owns one [`Recorder`] per source for the life of the process. Consumers
//! hold the registry by `Arc` and look recorders up by [`SourceId`]; nothing
//! else constructs recorders, so a source never ends up with two pacing
//! threads writing the same directory.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::control::RecordingCommand;
use crate::error::Result;
use crate::recorder::{Recorder, RecorderConfig, RecordingObserver, WriterFactory};

use super::key::SourceId;

/// Source-keyed recorder registry
///
/// Thread-safe via `RwLock`. Lookups for already-known sources take only the
/// read lock.
pub struct RecorderRegistry {
    /// Map of source to its recorder
    recorders: RwLock<HashMap<SourceId, Arc<Recorder>>>,

    /// Configuration for newly created recorders
    config: RecorderConfig,

    /// Writer factory shared by all recorders
    factory: Arc<dyn WriterFactory>,

    /// Observers attached to every recorder, present and future
    observers: parking_lot::Mutex<Vec<Arc<dyn RecordingObserver>>>,
}

impl RecorderRegistry {
    /// Create a registry whose recorders use `config`
    pub fn new(config: RecorderConfig) -> Self {
        let factory = config.writer.factory();
        Self::with_factory(config, factory)
    }

    /// Create a registry with a custom writer factory
    pub fn with_factory(config: RecorderConfig, factory: Arc<dyn WriterFactory>) -> Self {
        Self {
            recorders: RwLock::new(HashMap::new()),
            config,
            factory,
            observers: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get the recorder configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Attach an observer to every recorder, including ones created later
    pub async fn observe_all(&self, observer: Arc<dyn RecordingObserver>) {
        let recorders = self.recorders.read().await;
        for recorder in recorders.values() {
            recorder.register_observer(Arc::clone(&observer));
        }
        self.observers.lock().push(observer);
    }

    /// Get the recorder for `source`, creating it on first use
    pub async fn get_or_create(&self, source: &SourceId) -> Arc<Recorder> {
        if let Some(recorder) = self.recorders.read().await.get(source) {
            return Arc::clone(recorder);
        }

        let mut recorders = self.recorders.write().await;

        // Another task may have created it between the two locks
        if let Some(recorder) = recorders.get(source) {
            return Arc::clone(recorder);
        }

        let recorder = Arc::new(Recorder::with_factory(
            source.clone(),
            self.config.clone(),
            Arc::clone(&self.factory),
        ));
        for observer in self.observers.lock().iter() {
            recorder.register_observer(Arc::clone(observer));
        }
        recorders.insert(source.clone(), Arc::clone(&recorder));

        tracing::info!(
            source = %source,
            dir = %recorder.segment_dir().display(),
            "Recorder created"
        );

        recorder
    }

    /// Get the recorder for `source` if one exists
    pub async fn get(&self, source: &SourceId) -> Option<Arc<Recorder>> {
        self.recorders.read().await.get(source).cloned()
    }

    /// All known sources, sorted
    pub async fn sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<_> = self.recorders.read().await.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Sources currently recording, sorted
    pub async fn recording_sources(&self) -> Vec<SourceId> {
        let recorders = self.recorders.read().await;
        let mut sources: Vec<_> = recorders
            .iter()
            .filter(|(_, recorder)| recorder.is_recording())
            .map(|(source, _)| source.clone())
            .collect();
        sources.sort();
        sources
    }

    /// Get total number of recorders
    pub async fn recorder_count(&self) -> usize {
        self.recorders.read().await.len()
    }

    /// Apply a recording command to `source`
    ///
    /// Start and stop block on the pacing thread, so they run on the blocking
    /// pool. Returns whether the recorder changed state.
    pub async fn apply(&self, source: &SourceId, command: RecordingCommand) -> Result<bool> {
        let recorder = self.get_or_create(source).await;

        let outcome = tokio::task::spawn_blocking(move || match command {
            RecordingCommand::Start => recorder.start(),
            RecordingCommand::Stop => Ok(recorder.stop()),
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

        tracing::debug!(source = %source, command = %command, changed = outcome, "Command applied");
        Ok(outcome)
    }

    /// Stop every recorder, finalizing open segments
    pub async fn stop_all(&self) {
        let recorders: Vec<_> = self.recorders.read().await.values().cloned().collect();

        for recorder in recorders {
            let source = recorder.source().clone();
            let stopped = tokio::task::spawn_blocking(move || recorder.stop()).await;
            match stopped {
                Ok(true) => tracing::info!(source = %source, "Recorder stopped on shutdown"),
                Ok(false) => {}
                Err(e) => tracing::error!(source = %source, error = %e, "Stop task failed"),
            }
        }
    }
}
