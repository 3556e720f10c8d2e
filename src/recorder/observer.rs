//! Recording state observers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::registry::SourceId;

/// Receives `(is_recording, source)` on every start/stop transition
pub trait RecordingObserver: Send + Sync {
    fn on_recording_state(&self, is_recording: bool, source: &SourceId);
}

impl<F> RecordingObserver for F
where
    F: Fn(bool, &SourceId) + Send + Sync,
{
    fn on_recording_state(&self, is_recording: bool, source: &SourceId) {
        self(is_recording, source)
    }
}

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Observer list
#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    list: Mutex<Vec<(ObserverId, Arc<dyn RecordingObserver>)>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn RecordingObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.list.lock().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut list = self.list.lock();
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.list.lock().len()
    }

    /// Call every observer, outside the list lock so observers may
    /// register or unregister from inside the callback
    pub(crate) fn notify(&self, is_recording: bool, source: &SourceId) {
        let snapshot: Vec<_> = self.list.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in snapshot {
            observer.on_recording_state(is_recording, source);
        }
    }
}
