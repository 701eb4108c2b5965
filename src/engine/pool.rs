//! Bounded worker pool for generation and read tasks.
//!
//! Tasks are fallible closures. The first failure (error return or panic)
//! is captured and surfaced to the coordinator through `take_failure`,
//! which polls it between queue events; the sync then fails fast instead
//! of deadlocking or silently dropping a stream.

use crate::error::{Result, SyncError};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub struct WorkerPool {
    task_tx: Option<Sender<Task>>,
    handles: Vec<JoinHandle<()>>,
    failure: Arc<Mutex<Option<SyncError>>>,
    cancelled: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `workers` threads. Each pulls tasks off a shared queue until
    /// shutdown.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(SyncError::Config(
                "worker pool size must be at least 1".to_string(),
            ));
        }

        let (task_tx, task_rx) = crossbeam_channel::unbounded::<Task>();
        let failure = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx: Receiver<Task> = task_rx.clone();
            let failure = Arc::clone(&failure);
            let cancelled = Arc::clone(&cancelled);
            let handle = std::thread::Builder::new()
                .name(format!("sync-worker-{i}"))
                .spawn(move || worker_loop(rx, failure, cancelled))?;
            handles.push(handle);
        }

        debug!(workers, "worker pool started");
        Ok(Self {
            task_tx: Some(task_tx),
            handles,
            failure,
            cancelled,
        })
    }

    /// Enqueue a task. Never blocks waiting for a worker slot; fails only
    /// if the pool has been shut down.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| SyncError::Pool("submit after shutdown".to_string()))?;
        tx.send(Box::new(task))
            .map_err(|_| SyncError::Pool("task queue closed".to_string()))
    }

    /// Take the first captured task failure, if any. Subsequent failures
    /// after the first are logged by the workers but not retained.
    pub fn take_failure(&self) -> Option<SyncError> {
        self.failure.lock().expect("pool failure slot poisoned").take()
    }

    /// Stop accepting tasks, finish everything already queued, and join
    /// every worker. When this returns, no task is still running, so
    /// shared resources can be closed safely.
    pub fn shutdown(&mut self) {
        self.task_tx.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                // Worker panics outside a task are already recorded by the
                // catch_unwind in the loop; nothing more to do here.
                error!("worker thread did not exit cleanly");
            }
        }
    }

    /// Shut down without running tasks that have not started yet. Used on
    /// fatal errors: in-flight tasks run to completion (they cannot be
    /// interrupted mid-execution), queued ones are discarded.
    pub fn abort(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.shutdown();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    rx: Receiver<Task>,
    failure: Arc<Mutex<Option<SyncError>>>,
    cancelled: Arc<AtomicBool>,
) {
    while let Ok(task) = rx.recv() {
        if cancelled.load(Ordering::SeqCst) {
            continue;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        let err = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(payload) => SyncError::Panic(panic_message(payload)),
        };
        let mut slot = failure.lock().expect("pool failure slot poisoned");
        if slot.is_none() {
            *slot = Some(err);
        } else {
            error!(error = %err, "additional task failure after sync already failing");
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
