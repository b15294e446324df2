//! Cooperative cancellation
//!
//! Cancellation is honored only at step boundaries: the run loop checks its
//! flag before starting each step and never preempts in-flight work. The
//! registry is the in-process fast path; the persisted run state is the
//! durable signal that survives across processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Per-run cancellation flag handed to the execution loop.
#[derive(Debug, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tracks cancellation flags for in-flight runs.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run and returns its flag. Called when execution starts.
    pub fn register(&self, run_id: Uuid) -> CancelFlag {
        let flag = Arc::new(AtomicBool::new(false));
        self.inner.lock().unwrap().insert(run_id, flag.clone());
        CancelFlag(flag)
    }

    /// Signals cancellation for a run if it is currently executing here.
    ///
    /// Returns whether a flag was found; a missing flag just means the run is
    /// not in flight in this process.
    pub fn signal(&self, run_id: Uuid) -> bool {
        match self.inner.lock().unwrap().get(&run_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Drops the flag once a run reaches a terminal state.
    pub fn remove(&self, run_id: Uuid) {
        self.inner.lock().unwrap().remove(&run_id);
    }
}
