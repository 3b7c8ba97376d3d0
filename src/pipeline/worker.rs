//! Serial pipeline worker.
//!
//! One task per delivery queue. Messages are processed strictly one at a
//! time in arrival order, so two runs on the same queue never race on the
//! dedup record.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::pipeline::processor::Pipeline;
use crate::pipeline::types::InboundMessage;

/// Default queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Sending side of a pipeline worker. Dropping every clone stops the worker
/// once the queue is drained.
#[derive(Clone)]
pub struct PipelineQueue {
    name: Arc<str>,
    tx: mpsc::Sender<InboundMessage>,
}

impl PipelineQueue {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a message, waiting for room if the queue is full.
    pub async fn enqueue(&self, message: InboundMessage) -> Result<(), PipelineError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| PipelineError::QueueClosed(self.name.to_string()))
    }
}

/// Spawn a worker draining a new queue through `pipeline`.
///
/// The handle resolves to the number of messages processed.
pub fn spawn_pipeline_worker(
    name: &str,
    pipeline: Arc<Pipeline>,
    capacity: usize,
) -> (PipelineQueue, JoinHandle<usize>) {
    let (tx, mut rx) = mpsc::channel::<InboundMessage>(capacity.max(1));
    let queue = PipelineQueue {
        name: Arc::from(name),
        tx,
    };

    let worker_name = name.to_string();
    let handle = tokio::spawn(async move {
        info!(queue = %worker_name, "Pipeline worker started");
        let mut processed = 0usize;
        while let Some(message) = rx.recv().await {
            let outcome = pipeline.process(&message).await;
            processed += 1;
            debug!(queue = %worker_name, outcome = outcome.label(), processed, "Message done");
        }
        info!(queue = %worker_name, processed, "Pipeline worker stopped");
        processed
    });

    (queue, handle)
}
