//! Task queue: the enqueue/await primitive between stages and workers

use super::stages::{Pipeline, PipelineError, Stage};
use crate::records::RecordId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

/// Name of the queue the local worker pool drains.
pub const DEFAULT_QUEUE: &str = "citegraph";

/// Errors from task submission
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("task queue unavailable: {0}")]
    Unavailable(String),

    #[error("worker abandoned the task before completion")]
    WorkerLost,
}

/// Awaitable result of an enqueued stage batch.
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<Vec<String>, PipelineError>>,
}

impl TaskHandle {
    /// Await the batch result.
    pub async fn wait(self) -> Result<Vec<String>, PipelineError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Dispatch(DispatchError::WorkerLost)),
        }
    }
}

/// The task queue collaborator contract.
///
/// The consumer count is queried at dispatch time for batch sizing; there
/// is no ambient global worker state.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Live consumers attached to the named queue
    fn active_consumer_count(&self, queue: &str) -> usize;

    /// Hand one stage batch to the worker pool
    async fn enqueue(
        &self,
        stage: Stage,
        uuids: Vec<RecordId>,
    ) -> Result<TaskHandle, DispatchError>;
}

struct QueuedTask {
    stage: Stage,
    uuids: Vec<RecordId>,
    reply: oneshot::Sender<Result<Vec<String>, PipelineError>>,
}

/// In-process worker pool draining a single shared queue.
///
/// Each worker owns nothing but a handle to the shared pipeline; batches
/// may run concurrently and complete in any order.
pub struct LocalQueue {
    name: String,
    tx: mpsc::UnboundedSender<QueuedTask>,
    active: Arc<AtomicUsize>,
}

impl LocalQueue {
    /// Spawn `workers` consumer tasks executing batches against `pipeline`.
    pub fn start(pipeline: Arc<Pipeline>, workers: usize) -> Arc<Self> {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<QueuedTask>();
        let rx = Arc::new(Mutex::new(rx));
        let active = Arc::new(AtomicUsize::new(0));

        for worker in 0..workers {
            let rx = rx.clone();
            let pipeline = pipeline.clone();
            let active = active.clone();
            // Counted before the task is polled so dispatch-time sizing
            // already sees the full pool.
            active.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                loop {
                    let task = { rx.lock().await.recv().await };
                    let Some(task) = task else { break };
                    debug!(worker, stage = %task.stage, count = task.uuids.len(), "worker picked up batch");
                    let result = pipeline.run(task.stage, &task.uuids).await;
                    let _ = task.reply.send(result);
                }
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        Arc::new(Self {
            name: DEFAULT_QUEUE.to_string(),
            tx,
            active,
        })
    }
}

#[async_trait]
impl TaskQueue for LocalQueue {
    fn active_consumer_count(&self, queue: &str) -> usize {
        if queue == self.name {
            self.active.load(Ordering::SeqCst)
        } else {
            0
        }
    }

    async fn enqueue(
        &self,
        stage: Stage,
        uuids: Vec<RecordId>,
    ) -> Result<TaskHandle, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(QueuedTask { stage, uuids, reply })
            .map_err(|_| DispatchError::Unavailable("no consumers attached".into()))?;
        Ok(TaskHandle { rx })
    }
}
