//! Task Orchestrator: worker-aware chunking and dispatch

use super::chunk::{chunk_size, chunks};
use super::queue::{DispatchError, TaskHandle, TaskQueue, DEFAULT_QUEUE};
use super::stages::{PipelineError, Stage};
use crate::records::RecordId;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_FLOOR_CHUNK_SIZE: usize = 10;

/// Splits UUID batches into worker-sized chunks and drives them through the
/// task queue.
pub struct Orchestrator {
    queue: Arc<dyn TaskQueue>,
    queue_name: String,
    floor_chunk_size: usize,
}

impl Orchestrator {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            queue,
            queue_name: DEFAULT_QUEUE.to_string(),
            floor_chunk_size: DEFAULT_FLOOR_CHUNK_SIZE,
        }
    }

    pub fn with_floor_chunk_size(mut self, floor: usize) -> Self {
        self.floor_chunk_size = floor.max(1);
        self
    }

    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Chunk a batch by the consumer count observed right now and enqueue
    /// every chunk. Fire-and-forget: the returned handles may be awaited or
    /// dropped.
    pub async fn dispatch(
        &self,
        stage: Stage,
        uuids: Vec<RecordId>,
    ) -> Result<Vec<TaskHandle>, DispatchError> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }

        let consumers = self.queue.active_consumer_count(&self.queue_name);
        let size = chunk_size(uuids.len(), consumers, self.floor_chunk_size);
        debug!(
            %stage,
            total = uuids.len(),
            consumers,
            chunk = size,
            "dispatching batch"
        );

        let mut handles = Vec::new();
        for chunk in chunks(uuids, size) {
            handles.push(self.queue.enqueue(stage, chunk).await?);
        }
        Ok(handles)
    }

    /// Dispatch and await every chunk, concatenating results in chunk
    /// order, which is input order, since chunking preserves it.
    pub async fn dispatch_and_wait(
        &self,
        stage: Stage,
        uuids: Vec<RecordId>,
    ) -> Result<Vec<String>, PipelineError> {
        let handles = self.dispatch(stage, uuids).await?;
        let mut results = Vec::new();
        for handle in handles {
            results.extend(handle.wait().await?);
        }
        Ok(results)
    }
}
