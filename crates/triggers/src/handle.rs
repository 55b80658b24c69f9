use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use tagwire_core::DataLayer;

/// Owns a live detector: its background tasks and any data-layer
/// subscriptions it registered (possibly after an install delay).
///
/// Dropping the handle detaches the detector; call [`DetectorHandle::cancel`]
/// to tear it down.
pub struct DetectorHandle {
    tasks: Vec<JoinHandle<()>>,
    subscriptions: Arc<Mutex<Vec<u64>>>,
    data_layer: Arc<DataLayer>,
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl DetectorHandle {
    /// A detector whose URL gates failed: nothing runs, nothing to cancel.
    pub(crate) fn inert(data_layer: Arc<DataLayer>) -> Self {
        Self {
            tasks: Vec::new(),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            data_layer,
        }
    }

    pub(crate) fn with_task(task: JoinHandle<()>, data_layer: Arc<DataLayer>) -> Self {
        Self {
            tasks: vec![task],
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            data_layer,
        }
    }

    pub(crate) fn with_subscriptions(
        task: JoinHandle<()>,
        subscriptions: Arc<Mutex<Vec<u64>>>,
        data_layer: Arc<DataLayer>,
    ) -> Self {
        Self {
            tasks: vec![task],
            subscriptions,
            data_layer,
        }
    }

    /// Stop the detector: abort its tasks and drop its subscriptions.
    pub fn cancel(self) {
        for task in &self.tasks {
            task.abort();
        }
        for id in self.subscriptions.lock().drain(..) {
            self.data_layer.unsubscribe(id);
        }
    }

    /// Whether the detector still has a running task. One-shot detectors
    /// finish on their own once they fire.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }
}
