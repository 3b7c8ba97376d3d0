//! Interactive execution context.
//!
//! Clipboard writes, toasts and auto-fill broadcasts run here instead of on
//! the pipeline worker. Jobs arrive over an mpsc channel and run one at a
//! time in submission order. Submitting never waits for the job to run.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Job = BoxFuture<'static, ()>;

/// Owns the interactive task.
pub struct InteractiveContext {
    handle: InteractiveHandle,
    task: JoinHandle<()>,
}

/// Cloneable submission side of an [`InteractiveContext`].
#[derive(Clone)]
pub struct InteractiveHandle {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl InteractiveContext {
    /// Start the context's task on the current runtime.
    pub fn spawn(name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let handle = InteractiveHandle {
            name: Arc::from(name),
            tx,
            pending: Arc::clone(&pending),
            idle: Arc::clone(&idle),
        };

        let task_name = name.to_string();
        let task = tokio::spawn(async move {
            debug!(context = %task_name, "Interactive context started");
            while let Some(job) = rx.recv().await {
                job.await;
                if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    idle.notify_waiters();
                }
            }
            debug!(context = %task_name, "Interactive context stopped");
        });

        Self { handle, task }
    }

    pub fn handle(&self) -> InteractiveHandle {
        self.handle.clone()
    }

    /// Stop accepting work and wait for everything already submitted,
    /// including delayed jobs, once every other handle is dropped.
    pub async fn shutdown(self) {
        let Self { handle, task } = self;
        drop(handle);
        if let Err(e) = task.await {
            warn!(error = %e, "Interactive context task ended abnormally");
        }
    }
}

impl InteractiveHandle {
    /// Queue `job` behind everything already submitted.
    ///
    /// Returns `false` if the context has stopped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.enqueue(Box::pin(job))
    }

    /// Queue `job` after `delay`. Jobs submitted in the meantime run first.
    pub fn submit_after<F>(&self, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.enqueue(Box::pin(job));
        });
    }

    /// Wait until no submitted or delayed job is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn enqueue(&self, job: Job) -> bool {
        if self.tx.send(job).is_err() {
            warn!(context = %self.name, "Interactive context closed, dropping job");
            if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.idle.notify_waiters();
            }
            return false;
        }
        true
    }
}
