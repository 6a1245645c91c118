//! Pipeline stages: extract → reconcile → aggregate → reindex
//!
//! Every stage is idempotent and echoes its input UUIDs, as strings, in
//! input order; callers depend on `result.len() == input.len()`.

use super::queue::DispatchError;
use crate::aggregate::Aggregator;
use crate::index::{IndexError, RecordIndexer, RetryPolicy, SearchEngine};
use crate::records::RecordId;
use crate::relations::{RelationExtractor, RelationKind};
use crate::storage::{RecordStore, StorageResult};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// The named pipeline stages that can be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Full sequence: reconcile relations, recompute aggregates, reindex
    ProcessReferences,
    /// Relations and aggregates only, no reindex
    UpdateRelations,
    /// Reindex only (also the delete path)
    IndexRecords,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessReferences => "process_references",
            Self::UpdateRelations => "update_relations",
            Self::IndexRecords => "index_records",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can fail a whole stage batch.
///
/// Per-record faults never surface here; they are logged and the batch
/// continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("indexing error: {0}")]
    Index(#[from] IndexError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Executes the stage sequence over UUID batches.
///
/// One instance is shared by all workers; batches carry no state of their
/// own, so concurrent reprocessing of the same UUID is safe. Idempotence,
/// not serialization, is the protection.
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    aggregator: Aggregator,
    indexer: RecordIndexer,
}

impl Pipeline {
    pub fn new(store: Arc<dyn RecordStore>, engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            aggregator: Aggregator::new(store.clone()),
            indexer: RecordIndexer::new(store.clone(), engine),
            store,
        }
    }

    pub fn with_index_retry(mut self, retry: RetryPolicy) -> Self {
        self.indexer = self.indexer.with_retry(retry);
        self
    }

    /// Run one stage over a batch.
    pub async fn run(&self, stage: Stage, uuids: &[RecordId]) -> Result<Vec<String>, PipelineError> {
        match stage {
            Stage::ProcessReferences => self.process_references(uuids).await,
            Stage::UpdateRelations => self.update_relations(uuids).await,
            Stage::IndexRecords => self.index_records(uuids).await,
        }
    }

    /// Reconcile relations and aggregates for each record, then reindex the
    /// records themselves plus every target whose aggregate changed.
    ///
    /// Reindex runs strictly after the aggregate commits, so the index never
    /// shows a counter the relation store hasn't durably stored.
    pub async fn process_references(
        &self,
        uuids: &[RecordId],
    ) -> Result<Vec<String>, PipelineError> {
        let mut to_index: Vec<RecordId> = Vec::new();
        let mut seen: HashSet<RecordId> = HashSet::new();

        for uuid in uuids {
            if seen.insert(*uuid) {
                to_index.push(*uuid);
            }
            for target in self.reconcile_one(uuid) {
                if seen.insert(target) {
                    to_index.push(target);
                }
            }
        }

        self.indexer.reindex(&to_index).await?;
        Ok(Self::echo(uuids))
    }

    /// Relation-only maintenance: reconcile edges and recompute aggregates,
    /// without touching the search index.
    pub async fn update_relations(
        &self,
        uuids: &[RecordId],
    ) -> Result<Vec<String>, PipelineError> {
        for uuid in uuids {
            self.reconcile_one(uuid);
        }
        Ok(Self::echo(uuids))
    }

    /// Reindex-only entry point; deleted records come off the index here.
    pub async fn index_records(&self, uuids: &[RecordId]) -> Result<Vec<String>, PipelineError> {
        self.indexer.reindex(uuids).await?;
        Ok(Self::echo(uuids))
    }

    /// extract → reconcile → aggregate for one record. Failures are logged
    /// and isolated; they never abort the surrounding batch.
    fn reconcile_one(&self, uuid: &RecordId) -> Vec<RecordId> {
        match self.try_reconcile(uuid) {
            Ok(changed) => changed,
            Err(e) => {
                warn!(%uuid, error = %e, "relation update failed, continuing batch");
                Vec::new()
            }
        }
    }

    fn try_reconcile(&self, uuid: &RecordId) -> StorageResult<Vec<RecordId>> {
        let Some(record) = self.store.load_record(uuid)? else {
            debug!(%uuid, "batch names a record that does not exist");
            return Ok(Vec::new());
        };

        let desired = RelationExtractor::new(self.store.as_ref()).desired_edges(&record)?;
        let outcome = self.store.reconcile(uuid, &desired)?;
        if !outcome.is_noop() {
            debug!(
                %uuid,
                inserted = outcome.inserted,
                removed = outcome.removed,
                "relations reconciled"
            );
        }

        // The aggregate stage touches the record's own UUID plus the targets
        // the diff discovered.
        let mut targets = outcome.changed_targets;
        if RelationKind::counted_for(record.kind).is_some() && !targets.contains(&record.id) {
            targets.push(record.id);
        }
        self.aggregator.recompute(&targets)
    }

    fn echo(uuids: &[RecordId]) -> Vec<String> {
        uuids.iter().map(|u| u.to_string()).collect()
    }
}
