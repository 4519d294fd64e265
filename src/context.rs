//! Execution contexts: caller-supplied destinations for callback delivery.
//!
//! The core depends on a context through exactly one operation: accept a unit
//! of work for later execution, preserving FIFO order relative to other work
//! scheduled on the same context. A subscription that names a context has its
//! callbacks delivered there; a subscription without one runs synchronously on
//! whichever thread performs the settling transition.
//!
//! [`WorkerContext`] is the provided implementation: a dedicated worker thread
//! draining an in-order queue, the Rust rendition of a serial dispatch queue
//! or a "deliver on this thread" hint. Anything that can run a boxed closure
//! in order can implement [`ExecutionContext`].

use std::io;
use std::sync::mpsc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

/// A unit of work accepted by an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A destination capable of running callbacks asynchronously.
///
/// # Ordering
///
/// Implementations must run jobs in the order they were scheduled. The
/// promise core relies on this to keep subscriber delivery deterministic when
/// several subscriptions target the same context.
pub trait ExecutionContext: Send + Sync {
    /// Schedules a job for later execution on this context.
    fn schedule(&self, job: Job);
}

/// A dedicated worker thread draining a FIFO job queue.
///
/// Dropping the context closes the queue and joins the worker, so every job
/// scheduled before the drop is run before the drop returns.
pub struct WorkerContext {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerContext {
    /// Spawns a named worker thread and returns the context driving it.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl ExecutionContext for WorkerContext {
    fn schedule(&self, job: Job) {
        // The sender is only absent mid-drop; a job scheduled during teardown
        // is discarded rather than run on the wrong thread.
        if let Some(sender) = &*self.sender.lock() {
            let _ = sender.send(job);
        }
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        drop(self.sender.lock().take());
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("live", &self.sender.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    #[test]
    fn runs_scheduled_job() {
        let context = WorkerContext::new("test-worker").expect("spawn worker");
        let (tx, rx) = channel();
        context.schedule(Box::new(move || {
            tx.send(7).expect("report result");
        }));
        assert_eq!(rx.recv().expect("job should run"), 7);
    }

    #[test]
    fn preserves_fifo_order() {
        let context = WorkerContext::new("fifo-worker").expect("spawn worker");
        let (tx, rx) = channel();
        for n in 0..32 {
            let tx = tx.clone();
            context.schedule(Box::new(move || {
                tx.send(n).expect("report order");
            }));
        }
        let observed: Vec<i32> = (0..32).map(|_| rx.recv().expect("job ran")).collect();
        assert_eq!(observed, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn drop_drains_pending_jobs() {
        let (tx, rx) = channel();
        {
            let context = WorkerContext::new("drain-worker").expect("spawn worker");
            for n in 0..8 {
                let tx = tx.clone();
                context.schedule(Box::new(move || {
                    tx.send(n).expect("report");
                }));
            }
            // drop joins the worker after the queue empties
        }
        let observed: Vec<i32> = (0..8).map(|_| rx.recv().expect("job ran")).collect();
        assert_eq!(observed, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn usable_through_trait_object() {
        let context: Arc<dyn ExecutionContext> =
            Arc::new(WorkerContext::new("dyn-worker").expect("spawn worker"));
        let (tx, rx) = channel();
        context.schedule(Box::new(move || {
            tx.send("ran").expect("report");
        }));
        assert_eq!(rx.recv().expect("job ran"), "ran");
    }
}
