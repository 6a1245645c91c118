//! Migration pipeline: legacy mirror ingestion into normalized records
//!
//! Migration never blocks on relation convergence: finished batches are
//! handed to the relation-maintenance stage through the orchestrator and
//! the summary returns immediately.

use crate::legacy::{split_payloads, MirrorRecord, RecordTransformer};
use crate::pipeline::{DispatchError, Orchestrator, Stage};
use crate::records::{ControlNumber, NormalizedRecord, RecordId};
use crate::storage::{RecordStore, StorageError};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Which mirror rows a migration run covers.
#[derive(Debug, Clone)]
pub enum MirrorSelector {
    /// Every mirror row, migrated or not
    All,
    /// Rows not yet migrated, including previously failed ones
    Pending,
    /// An explicit recid set
    Recids(BTreeSet<ControlNumber>),
}

/// Errors that abort a migration run (per-record faults never do).
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Outcome of populating the mirror from a dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub inserted: usize,
    pub rejected: usize,
}

/// Outcome of a migration run: what was migrated, what was skipped and why.
#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub migrated: Vec<RecordId>,
    pub skipped: Vec<(ControlNumber, String)>,
}

/// Callback invoked after a record commit.
pub type CommitHook = Arc<dyn Fn(&NormalizedRecord) + Send + Sync>;

/// Drives legacy mirror rows through the transformer into the record store.
pub struct Migrator {
    store: Arc<dyn RecordStore>,
    transformer: Arc<dyn RecordTransformer>,
    orchestrator: Option<Arc<Orchestrator>>,
    on_committed: Vec<CommitHook>,
}

impl Migrator {
    pub fn new(store: Arc<dyn RecordStore>, transformer: Arc<dyn RecordTransformer>) -> Self {
        Self {
            store,
            transformer,
            orchestrator: None,
            on_committed: Vec::new(),
        }
    }

    /// Attach the orchestrator that receives migrated batches for relation
    /// maintenance.
    pub fn with_orchestrator(mut self, orchestrator: Arc<Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Register a callback fired after each successful record commit.
    pub fn register_on_committed(&mut self, hook: CommitHook) {
        self.on_committed.push(hook);
    }

    /// Split a legacy dump file into payloads and insert mirror rows.
    pub fn populate_mirror_from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<PopulateSummary, MigrationError> {
        let dump = std::fs::read(path)?;
        self.populate_mirror(&dump)
    }

    /// Insert one mirror row per payload in the dump. Payloads without a
    /// usable control number can't be keyed and are rejected here.
    pub fn populate_mirror(&self, dump: &[u8]) -> Result<PopulateSummary, MigrationError> {
        let mut summary = PopulateSummary::default();
        for payload in split_payloads(dump) {
            match MirrorRecord::from_payload(payload) {
                Ok(mirror) => {
                    self.store.save_mirror(&mirror)?;
                    summary.inserted += 1;
                }
                Err(e) => {
                    warn!(error = %e, "rejecting payload with no usable control number");
                    summary.rejected += 1;
                }
            }
        }
        info!(
            inserted = summary.inserted,
            rejected = summary.rejected,
            "mirror populated"
        );
        Ok(summary)
    }

    /// Migrate the selected mirror rows.
    ///
    /// A record that fails validation is marked invalid on its mirror row
    /// and skipped; the rest of the batch continues. Migrated UUIDs are
    /// enqueued for relation maintenance, fire-and-forget.
    pub async fn migrate(
        &self,
        selector: MirrorSelector,
    ) -> Result<MigrationSummary, MigrationError> {
        let recids = match selector {
            MirrorSelector::All => self.store.all_mirror_recids()?,
            MirrorSelector::Pending => self.store.pending_mirror_recids()?,
            MirrorSelector::Recids(recids) => recids.into_iter().collect(),
        };

        let mut summary = MigrationSummary::default();
        for recid in recids {
            match self.migrate_one(recid) {
                Ok(id) => summary.migrated.push(id),
                Err(MigrateOneError::Skipped(reason)) => {
                    summary.skipped.push((recid, reason));
                }
                Err(MigrateOneError::Storage(e)) => return Err(e.into()),
            }
        }

        info!(
            migrated = summary.migrated.len(),
            skipped = summary.skipped.len(),
            "migration batch finished"
        );

        if let Some(orchestrator) = &self.orchestrator {
            if !summary.migrated.is_empty() {
                // Enqueue and return; relation convergence happens on the
                // worker pool.
                let _handles = orchestrator
                    .dispatch(Stage::ProcessReferences, summary.migrated.clone())
                    .await?;
            }
        }

        Ok(summary)
    }

    /// Migrate an explicit recid set.
    pub async fn migrate_recids(
        &self,
        recids: impl IntoIterator<Item = ControlNumber>,
    ) -> Result<MigrationSummary, MigrationError> {
        self.migrate(MirrorSelector::Recids(recids.into_iter().collect()))
            .await
    }

    fn migrate_one(&self, recid: ControlNumber) -> Result<RecordId, MigrateOneError> {
        let Some(mirror) = self.store.load_mirror(recid)? else {
            warn!(%recid, "recid not present in mirror");
            return Err(MigrateOneError::Skipped("not present in mirror".into()));
        };

        let mut record = match self.transformer.normalize(&mirror.raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(%recid, error = %e, "legacy record failed validation, skipping");
                self.store.set_mirror_invalid(recid, &e.to_string())?;
                return Err(MigrateOneError::Skipped(e.to_string()));
            }
        };

        // Updates keep the existing identity and the aggregates the relation
        // pipeline has already computed.
        if let Some(existing) = self
            .store
            .load_by_control_number(record.kind, record.control_number)?
        {
            record.id = existing.id;
            record.created_at = existing.created_at;
            record.citation_count = existing.citation_count;
            record.number_of_contributions = existing.number_of_contributions;
            record.number_of_papers = existing.number_of_papers;
        }
        record.updated_at = Utc::now();

        self.store.save_record(&record)?;
        self.store.set_mirror_migrated(recid)?;
        for hook in &self.on_committed {
            hook(&record);
        }

        Ok(record.id)
    }
}

enum MigrateOneError {
    Skipped(String),
    Storage(StorageError),
}

impl From<StorageError> for MigrateOneError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::LegacyTransformer;
    use crate::records::RecordKind;
    use crate::storage::{OpenStore, SqliteStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn migrator() -> (Arc<SqliteStore>, Migrator) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let migrator = Migrator::new(store.clone(), Arc::new(LegacyTransformer::new()));
        (store, migrator)
    }

    const DUMP: &[u8] = b"001 666\n245 $$aCiter\n980 $$aHEP\n999C5 $$0667$$y2018\n\n\
                          001 667\n245 $$aCited\n980 $$aHEP\n";

    #[tokio::test]
    async fn migrates_valid_mirror_rows() {
        let (store, migrator) = migrator();
        let populated = migrator.populate_mirror(DUMP).unwrap();
        assert_eq!(populated, PopulateSummary { inserted: 2, rejected: 0 });

        let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();
        assert_eq!(summary.migrated.len(), 2);
        assert!(summary.skipped.is_empty());

        let citer = store
            .load_by_control_number(RecordKind::Literature, ControlNumber::new(666))
            .unwrap()
            .unwrap();
        assert_eq!(citer.metadata.title.as_deref(), Some("Citer"));
        assert!(store
            .load_mirror(ControlNumber::new(666))
            .unwrap()
            .unwrap()
            .migrated);
    }

    #[tokio::test]
    async fn invalid_record_is_skipped_and_marked() {
        let (store, migrator) = migrator();
        let dump = b"001 666\n980 $$aHEP\n\n\
                     001 668\n980 $$aHEP\n999C5 $$0667$$yDefinitely not a year\n";
        migrator.populate_mirror(dump).unwrap();

        let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();
        assert_eq!(summary.migrated.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0, ControlNumber::new(668));

        let mirror = store.load_mirror(ControlNumber::new(668)).unwrap().unwrap();
        assert!(!mirror.valid);
        assert!(mirror.error.as_deref().unwrap().contains("year"));
        assert!(!mirror.migrated);

        // The invalid record never became a normalized record
        assert!(store
            .load_by_control_number(RecordKind::Literature, ControlNumber::new(668))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn populate_rejects_unkeyable_payloads() {
        let (_, migrator) = migrator();
        let dump = b"980 $$aHEP\n\n001 666\n980 $$aHEP\n";
        let summary = migrator.populate_mirror(dump).unwrap();
        assert_eq!(summary, PopulateSummary { inserted: 1, rejected: 1 });
    }

    #[tokio::test]
    async fn remigration_keeps_identity_and_aggregates() {
        let (store, migrator) = migrator();
        migrator.populate_mirror(DUMP).unwrap();
        let first = migrator.migrate(MirrorSelector::Pending).await.unwrap();

        // Simulate the relation pipeline having computed a count
        let mut cited = store
            .load_by_control_number(RecordKind::Literature, ControlNumber::new(667))
            .unwrap()
            .unwrap();
        cited.citation_count = 1;
        store.save_record(&cited).unwrap();

        let second = migrator.migrate(MirrorSelector::All).await.unwrap();
        assert_eq!(
            first.migrated.iter().collect::<std::collections::HashSet<_>>(),
            second.migrated.iter().collect::<std::collections::HashSet<_>>()
        );

        let reloaded = store
            .load_by_control_number(RecordKind::Literature, ControlNumber::new(667))
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.id, cited.id);
        assert_eq!(reloaded.citation_count, 1);
    }

    #[tokio::test]
    async fn commit_hooks_fire_per_migrated_record() {
        let (_, mut migrator) = migrator();
        migrator.populate_mirror(DUMP).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        migrator.register_on_committed(Arc::new(move |_record| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        migrator.migrate(MirrorSelector::Pending).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn migrate_recids_limits_scope() {
        let (store, migrator) = migrator();
        migrator.populate_mirror(DUMP).unwrap();

        let summary = migrator
            .migrate_recids([ControlNumber::new(667)])
            .await
            .unwrap();
        assert_eq!(summary.migrated.len(), 1);

        assert!(store
            .load_by_control_number(RecordKind::Literature, ControlNumber::new(666))
            .unwrap()
            .is_none());
    }
}
