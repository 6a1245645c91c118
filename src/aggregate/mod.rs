//! Aggregator: keeps denormalized counters equal to live edge counts

use crate::records::RecordId;
use crate::storage::{AggregateOutcome, RecordStore, StorageResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Recomputes aggregate counters on edge targets.
///
/// Each target is recomputed from the relation store's live edge count in
/// its own transaction; the stored value is only written when it differs.
pub struct Aggregator {
    store: Arc<dyn RecordStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Recompute the given targets, returning the subset whose stored value
    /// actually changed. Only those need a reindex.
    pub fn recompute(&self, targets: &[RecordId]) -> StorageResult<Vec<RecordId>> {
        let mut changed = Vec::new();
        for target in targets {
            match self.store.recompute_aggregate(target)? {
                AggregateOutcome::Changed { previous, current } => {
                    debug!(%target, previous, current, "aggregate updated");
                    changed.push(*target);
                }
                AggregateOutcome::Unchanged => {}
                AggregateOutcome::Skipped => {
                    warn!(%target, "aggregate target missing or carries no counter");
                }
            }
        }
        Ok(changed)
    }
}
