//! Storage trait definitions

use crate::legacy::MirrorRecord;
use crate::records::{ControlNumber, NormalizedRecord, RecordId, RecordKind};
use crate::relations::{RelationEdge, RelationKind};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a reconciliation changed for one source record.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Edges inserted
    pub inserted: usize,
    /// Edges deleted
    pub removed: usize,
    /// Deduplicated targets whose inbound edge count moved
    pub changed_targets: Vec<RecordId>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.removed == 0
    }
}

/// What recomputing one target's aggregate did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    /// Stored value replaced
    Changed { previous: u64, current: u64 },
    /// Stored value already matched the live edge count
    Unchanged,
    /// Target missing or its kind carries no aggregate
    Skipped,
}

/// Mirror store counters for status reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub total: usize,
    pub migrated: usize,
    pub invalid: usize,
}

/// Trait for the record/mirror/relation storage backend
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent access from multiple worker tasks.
pub trait RecordStore: Send + Sync {
    // === Record Operations ===

    /// Save a record (insert or update)
    fn save_record(&self, record: &NormalizedRecord) -> StorageResult<()>;

    /// Load a record by ID
    fn load_record(&self, id: &RecordId) -> StorageResult<Option<NormalizedRecord>>;

    /// Load a record by kind + control number
    fn load_by_control_number(
        &self,
        kind: RecordKind,
        control_number: ControlNumber,
    ) -> StorageResult<Option<NormalizedRecord>>;

    /// Resolve a kind + control number to the record's ID, if it exists
    fn resolve(
        &self,
        kind: RecordKind,
        control_number: ControlNumber,
    ) -> StorageResult<Option<RecordId>>;

    // === Mirror Operations ===

    /// Insert a mirror row. Re-inserting an already-migrated recid leaves
    /// the existing row untouched; otherwise payload and validation state
    /// are refreshed.
    fn save_mirror(&self, mirror: &MirrorRecord) -> StorageResult<()>;

    /// Load a mirror row by recid
    fn load_mirror(&self, recid: ControlNumber) -> StorageResult<Option<MirrorRecord>>;

    /// All mirror recids, in recid order
    fn all_mirror_recids(&self) -> StorageResult<Vec<ControlNumber>>;

    /// Mirror recids not yet migrated (including previously failed ones)
    fn pending_mirror_recids(&self) -> StorageResult<Vec<ControlNumber>>;

    /// Mark a mirror row as migrated (clears any previous error)
    fn set_mirror_migrated(&self, recid: ControlNumber) -> StorageResult<()>;

    /// Mark a mirror row invalid with the validation error detail
    fn set_mirror_invalid(&self, recid: ControlNumber, error: &str) -> StorageResult<()>;

    /// Mirror store counters
    fn mirror_stats(&self) -> StorageResult<MirrorStats>;

    // === Relation Operations ===

    /// Atomically reconcile the stored outbound edges of `source` against
    /// `desired`: insert the missing edges, delete the unsupported ones.
    /// Duplicate inserts from concurrent batches are absorbed.
    fn reconcile(
        &self,
        source: &RecordId,
        desired: &[RelationEdge],
    ) -> StorageResult<ReconcileOutcome>;

    /// Outbound edges of a source record
    fn edges_from(&self, source: &RecordId) -> StorageResult<Vec<RelationEdge>>;

    /// Inbound edges of a target, for one relation kind
    fn edges_to(&self, kind: RelationKind, target: &RecordId) -> StorageResult<Vec<RelationEdge>>;

    /// Live inbound edge count for a target, for one relation kind
    fn count_edges_to(&self, kind: RelationKind, target: &RecordId) -> StorageResult<u64>;

    // === Aggregate Operations ===

    /// Recompute a target's aggregate from the live edge count and persist
    /// it only if it differs from the stored value. Read and write happen
    /// in one transaction.
    fn recompute_aggregate(&self, target: &RecordId) -> StorageResult<AggregateOutcome>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RecordStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
