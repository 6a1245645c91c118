//! Record indexer: pushes committed record state into the search engine

use super::engine::{IndexDocument, IndexError, SearchEngine};
use crate::records::RecordId;
use crate::storage::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry settings for a flaky search engine.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per operation (first try included)
    pub attempts: u32,
    /// Backoff before the first retry; doubles per retry
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Decides upsert-vs-delete per record and drives the engine with retries.
pub struct RecordIndexer {
    store: Arc<dyn RecordStore>,
    engine: Arc<dyn SearchEngine>,
    retry: RetryPolicy,
}

impl RecordIndexer {
    pub fn new(store: Arc<dyn RecordStore>, engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            store,
            engine,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reindex the given records: deleted records are removed from the
    /// index, everything else is upserted with its current state.
    ///
    /// Unknown UUIDs are skipped with a warning. Engine failures are
    /// retried with backoff; exhaustion fails the batch, which is safe to
    /// re-run since every operation here is idempotent.
    pub async fn reindex(&self, uuids: &[RecordId]) -> Result<(), IndexError> {
        for uuid in uuids {
            let record = match self.store.load_record(uuid) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(%uuid, "skipping reindex of unknown record");
                    continue;
                }
                Err(e) => {
                    warn!(%uuid, error = %e, "skipping reindex, record load failed");
                    continue;
                }
            };

            if record.deleted {
                debug!(%uuid, "deleting record from index");
                self.retrying(|| self.engine.delete(uuid)).await?;
            } else {
                let doc = IndexDocument::from_record(&record);
                self.retrying(|| self.engine.upsert(doc.clone())).await?;
            }
        }

        self.retrying(|| self.engine.refresh()).await
    }

    async fn retrying(
        &self,
        op: impl Fn() -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.attempts => {
                    warn!(attempt, error = %e, "search engine operation failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
