//! Recorder state machine
//!
//! `Idle -> Recording -> Idle`. The pacing loop runs on its own OS thread so
//! encoder work never stalls the async runtime; `stop()` joins it, which means
//! the segment is finalized by the time `stop()` returns.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use crate::error::{RecorderError, Result};
use crate::media::RasterFrame;
use crate::registry::SourceId;

use super::config::RecorderConfig;
use super::observer::{ObserverId, Observers, RecordingObserver};
use super::segment::FinalizedSegment;
use super::worker;
use super::writer::WriterFactory;

/// State shared between a [`Recorder`] handle and its pacing thread
pub(crate) struct Shared {
    pub(crate) source: SourceId,
    pub(crate) config: RecorderConfig,
    pub(crate) factory: Arc<dyn WriterFactory>,
    latest: RwLock<Option<Arc<RasterFrame>>>,
    recording: AtomicBool,
    observers: Observers,
    last_segment: Mutex<Option<FinalizedSegment>>,
    segments_finalized: AtomicU64,
    schedule_resets: AtomicU64,
}

impl Shared {
    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub(crate) fn latest_frame(&self) -> Option<Arc<RasterFrame>> {
        self.latest.read().clone()
    }

    pub(crate) fn segment_dir(&self) -> PathBuf {
        self.config.storage_root.join(self.source.dir_name())
    }

    pub(crate) fn segment_finalized(&self, segment: FinalizedSegment) {
        self.segments_finalized.fetch_add(1, Ordering::Relaxed);
        *self.last_segment.lock() = Some(segment);
    }

    pub(crate) fn schedule_reset(&self) {
        self.schedule_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Leave `Recording` from inside the pacing loop
    pub(crate) fn abandon(&self) {
        if self.recording.swap(false, Ordering::AcqRel) {
            self.observers.notify(false, &self.source);
        }
    }
}

/// Paced, drift-corrected recorder for one source
///
/// Frames are handed in with [`update_frame`](Self::update_frame) at whatever
/// rate the source produces them. While recording, a dedicated thread writes
/// the latest frame at the configured rate, repeating it when the source is
/// slower than the target.
pub struct Recorder {
    shared: Arc<Shared>,
    /// Lifecycle lock: serializes start/stop and holds the pacing thread
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Recorder {
    /// Create a recorder using the writer named by `config.writer`
    pub fn new(source: SourceId, config: RecorderConfig) -> Self {
        let factory = config.writer.factory();
        Self::with_factory(source, config, factory)
    }

    /// Create a recorder with a custom writer factory
    pub fn with_factory(
        source: SourceId,
        config: RecorderConfig,
        factory: Arc<dyn WriterFactory>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                config,
                factory,
                latest: RwLock::new(None),
                recording: AtomicBool::new(false),
                observers: Observers::default(),
                last_segment: Mutex::new(None),
                segments_finalized: AtomicU64::new(0),
                schedule_resets: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.shared.source
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.shared.config
    }

    /// Directory segments for this source are written to
    pub fn segment_dir(&self) -> PathBuf {
        self.shared.segment_dir()
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    /// Whether at least one frame has been handed in
    pub fn has_frame(&self) -> bool {
        self.shared.latest.read().is_some()
    }

    /// Store a copy of `frame` as the latest frame
    pub fn update_frame(&self, frame: &RasterFrame) {
        let copy = Arc::new(frame.clone());
        *self.shared.latest.write() = Some(copy);
    }

    /// Start recording
    ///
    /// Returns `Ok(false)` if already recording. Fails with
    /// [`RecorderError::NoFrame`] while no frame has arrived, since the
    /// segment size is taken from the latest frame.
    pub fn start(&self) -> Result<bool> {
        let mut worker = self.worker.lock();

        if self.shared.is_recording() {
            return Ok(false);
        }

        // A loop that gave up on its own still needs reaping
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!(source = %self.shared.source, "Recorder thread panicked");
            }
        }

        let dimensions = match self.shared.latest.read().as_ref() {
            Some(frame) => frame.dimensions(),
            None => return Err(RecorderError::NoFrame(self.shared.source.clone()).into()),
        };

        self.shared.recording.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("recorder-{}", self.shared.source.dir_name()))
            .spawn(move || worker::run(shared));

        match spawned {
            Ok(handle) => *worker = Some(handle),
            Err(e) => {
                self.shared.recording.store(false, Ordering::Release);
                return Err(RecorderError::WriterOpen(e).into());
            }
        }
        drop(worker);

        tracing::info!(
            source = %self.shared.source,
            width = dimensions.0,
            height = dimensions.1,
            fps = self.shared.config.target_fps,
            "Recording started"
        );
        self.shared.observers.notify(true, &self.shared.source);
        Ok(true)
    }

    /// Stop recording and wait for the segment to be finalized
    ///
    /// Returns `false` if the recorder was not recording.
    pub fn stop(&self) -> bool {
        let mut worker = self.worker.lock();
        let was_recording = self.shared.recording.swap(false, Ordering::AcqRel);

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!(source = %self.shared.source, "Recorder thread panicked");
            }
        }
        drop(worker);

        if was_recording {
            tracing::info!(source = %self.shared.source, "Recording stopped");
            self.shared.observers.notify(false, &self.shared.source);
        }
        was_recording
    }

    /// Register a state observer
    pub fn register_observer(&self, observer: Arc<dyn RecordingObserver>) -> ObserverId {
        self.shared.observers.add(observer)
    }

    /// Unregister a state observer, returning whether it was registered
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.shared.observers.remove(id)
    }

    /// Most recently finalized segment
    pub fn last_segment(&self) -> Option<FinalizedSegment> {
        self.shared.last_segment.lock().clone()
    }

    /// Segments finalized over the recorder's lifetime
    pub fn segments_finalized(&self) -> u64 {
        self.shared.segments_finalized.load(Ordering::Relaxed)
    }

    /// Times the pacing loop fell behind and restarted its schedule
    pub fn schedule_resets(&self) -> u64 {
        self.shared.schedule_resets.load(Ordering::Relaxed)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("source", &self.shared.source)
            .field("recording", &self.is_recording())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::recorder::segment::parse_segment_file_name;
    use crate::recorder::writer::SegmentWriter;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn frame() -> RasterFrame {
        RasterFrame::filled(4, 2, [200, 100, 50])
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().into_string().unwrap())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn transitions(recorder: &Recorder) -> Arc<Mutex<Vec<bool>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        recorder.register_observer(Arc::new(move |rec: bool, _: &SourceId| {
            sink.lock().push(rec);
        }));
        seen
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Stall { first_write: Duration },
        AlwaysFail,
    }

    struct FakeFactory {
        behavior: Behavior,
        writes: Arc<Mutex<Vec<Instant>>>,
    }

    struct FakeWriter {
        _file: File,
        behavior: Behavior,
        writes: Arc<Mutex<Vec<Instant>>>,
    }

    impl WriterFactory for FakeFactory {
        fn extension(&self) -> &str {
            "raw"
        }

        fn open(&self, path: &Path, _: u32, _: u32, _: u32) -> Result<Box<dyn SegmentWriter>> {
            let file = File::create(path).map_err(RecorderError::WriterOpen)?;
            Ok(Box::new(FakeWriter {
                _file: file,
                behavior: self.behavior,
                writes: Arc::clone(&self.writes),
            }))
        }
    }

    impl SegmentWriter for FakeWriter {
        fn write_frame(&mut self, _: &RasterFrame) -> Result<()> {
            match self.behavior {
                Behavior::Stall { first_write } => {
                    let first = self.writes.lock().is_empty();
                    if first {
                        thread::sleep(first_write);
                    }
                    self.writes.lock().push(Instant::now());
                    Ok(())
                }
                Behavior::AlwaysFail => Err(RecorderError::Write(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                ))
                .into()),
            }
        }

        fn finish(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_start_without_frame_fails() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()),
        );
        let seen = transitions(&recorder);

        let err = recorder.start().unwrap_err();
        assert!(matches!(err, Error::Recorder(RecorderError::NoFrame(_))));
        assert!(!recorder.is_recording());
        assert!(seen.lock().is_empty());
        assert!(file_names(dir.path()).is_empty());
    }

    #[test]
    fn test_start_stop_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("10.0.0.7"),
            RecorderConfig::with_storage_root(dir.path()).target_fps(50),
        );
        let seen = transitions(&recorder);
        recorder.update_frame(&frame());

        assert!(recorder.start().unwrap());
        assert!(!recorder.start().unwrap());
        assert!(recorder.is_recording());

        thread::sleep(Duration::from_millis(100));

        assert!(recorder.stop());
        assert!(!recorder.stop());
        assert!(!recorder.is_recording());

        assert_eq!(*seen.lock(), vec![true, false]);
        assert_eq!(recorder.segments_finalized(), 1);

        let names = file_names(&recorder.segment_dir());
        assert_eq!(names.len(), 1);
        let (start, end, ext) = parse_segment_file_name(&names[0]).unwrap();
        assert!(start < end);
        assert_eq!(ext, "y4m");
    }

    #[test]
    fn test_immediate_stop_still_finalizes_segment() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()),
        );
        recorder.update_frame(&frame());

        for round in 1..=3u64 {
            assert!(recorder.start().unwrap());
            assert!(recorder.stop());
            assert_eq!(recorder.segments_finalized(), round);
            thread::sleep(Duration::from_millis(5));
        }

        let names = file_names(&recorder.segment_dir());
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| parse_segment_file_name(n).is_some()));
    }

    #[test]
    fn test_segment_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()),
        );
        recorder.update_frame(&frame());

        for _ in 0..2 {
            recorder.start().unwrap();
            thread::sleep(Duration::from_millis(40));
            recorder.stop();
            // Distinct start timestamps
            thread::sleep(Duration::from_millis(5));
        }

        let names = file_names(&recorder.segment_dir());
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.ends_with(".part")));
    }

    #[test]
    fn test_frame_repetition_on_stale_source() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()).target_fps(50),
        );
        recorder.update_frame(&frame());

        recorder.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        recorder.stop();

        let stats = recorder.last_segment().unwrap().stats;
        assert!(stats.frames_written >= 2, "wrote {}", stats.frames_written);
        // Only the first write used a fresh frame
        assert_eq!(stats.repeated_frames, stats.frames_written - 1);
        assert_eq!((stats.width, stats.height), (4, 2));
    }

    #[test]
    fn test_fresh_frames_are_not_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()).target_fps(10),
        ));
        recorder.update_frame(&frame());
        recorder.start().unwrap();

        // Source three times faster than the recorder
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            recorder.update_frame(&frame());
            thread::sleep(Duration::from_millis(33));
        }
        recorder.stop();

        let stats = recorder.last_segment().unwrap().stats;
        assert!(stats.frames_written >= 3);
        assert!(stats.repeated_frames < stats.frames_written / 2);
    }

    #[test]
    fn test_pacing_rate() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()).target_fps(20),
        );
        recorder.update_frame(&frame());

        recorder.start().unwrap();
        thread::sleep(Duration::from_secs(5));
        recorder.stop();

        // 5 s at 20 fps: 100 intervals plus the write at t = 0, within 10%
        let written = recorder.last_segment().unwrap().stats.frames_written;
        assert!((91..=111).contains(&written), "wrote {}", written);
    }

    #[test]
    fn test_stall_resets_schedule_without_burst() {
        let dir = tempfile::tempdir().unwrap();
        let writes = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(FakeFactory {
            behavior: Behavior::Stall {
                first_write: Duration::from_millis(400),
            },
            writes: Arc::clone(&writes),
        });
        let recorder = Recorder::with_factory(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()).target_fps(50),
            factory,
        );
        recorder.update_frame(&frame());

        recorder.start().unwrap();
        thread::sleep(Duration::from_millis(700));
        recorder.stop();

        let writes = writes.lock();
        assert!(writes.len() > 2);
        let stall_end = writes[0];

        // Catching up would fire ~20 writes right after the stall
        let burst = writes
            .iter()
            .filter(|t| t.duration_since(stall_end) < Duration::from_millis(100))
            .count();
        assert!(burst <= 8, "{} writes within 100ms of the stall", burst);
        // One stall, one restart of the schedule
        assert_eq!(recorder.schedule_resets(), 1);
    }

    #[test]
    fn test_write_failures_abandon_recording() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(FakeFactory {
            behavior: Behavior::AlwaysFail,
            writes: Arc::new(Mutex::new(Vec::new())),
        });
        let recorder = Recorder::with_factory(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path())
                .error_backoff(Duration::from_millis(5))
                .max_consecutive_failures(3),
            factory,
        );
        let seen = transitions(&recorder);
        recorder.update_frame(&frame());

        recorder.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while recorder.is_recording() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        assert!(!recorder.is_recording());
        assert_eq!(*seen.lock(), vec![true, false]);

        // Every failed segment was still finalized
        let names = file_names(&recorder.segment_dir());
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| n.ends_with(".raw")));

        // Already idle: no second notification
        assert!(!recorder.stop());
        assert_eq!(seen.lock().len(), 2);

        // Can be started again
        assert!(recorder.start().unwrap());
        recorder.stop();
    }

    #[test]
    fn test_unregistered_observer_is_not_called() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            SourceId::new("cam"),
            RecorderConfig::with_storage_root(dir.path()),
        );
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let id = recorder.register_observer(Arc::new(move |_: bool, _: &SourceId| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(recorder.unregister_observer(id));

        recorder.update_frame(&frame());
        recorder.start().unwrap();
        recorder.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_finalizes_segment() {
        let dir = tempfile::tempdir().unwrap();
        let segment_dir;
        {
            let recorder = Recorder::new(
                SourceId::new("cam"),
                RecorderConfig::with_storage_root(dir.path()),
            );
            segment_dir = recorder.segment_dir();
            recorder.update_frame(&frame());
            recorder.start().unwrap();
            thread::sleep(Duration::from_millis(50));
        }

        let names = file_names(&segment_dir);
        assert_eq!(names.len(), 1);
        assert!(parse_segment_file_name(&names[0]).is_some());
    }
}
