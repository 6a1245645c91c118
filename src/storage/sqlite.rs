//! SQLite storage backend

use super::traits::{
    AggregateOutcome, MirrorStats, OpenStore, ReconcileOutcome, RecordStore, StorageError,
    StorageResult,
};
use crate::legacy::MirrorRecord;
use crate::records::{ControlNumber, NormalizedRecord, RecordId, RecordKind};
use crate::relations::{diff, RelationEdge, RelationKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed record, mirror, and relation store
///
/// Uses a single database file with tables for normalized records, legacy
/// mirror rows, and relation edges. Thread-safe via internal mutex on the
/// connection; multi-statement mutations run as immediate transactions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Normalized records; the JSON column is authoritative, the
            -- kind/control_number columns exist for lookups.
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                control_number INTEGER NOT NULL,
                record_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (kind, control_number)
            );

            CREATE INDEX IF NOT EXISTS idx_records_kind
                ON records(kind);

            -- Raw legacy payloads plus validation state
            CREATE TABLE IF NOT EXISTS legacy_mirror (
                recid INTEGER PRIMARY KEY,
                raw BLOB NOT NULL,
                valid INTEGER NOT NULL,
                error TEXT,
                migrated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mirror_migrated
                ON legacy_mirror(migrated);

            -- Relation edges; uniqueness on the full triple absorbs
            -- duplicate inserts from concurrent reconciliations.
            CREATE TABLE IF NOT EXISTS relations (
                kind TEXT NOT NULL,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                PRIMARY KEY (kind, source_id, target_id)
            );

            CREATE INDEX IF NOT EXISTS idx_relations_source
                ON relations(source_id);
            CREATE INDEX IF NOT EXISTS idx_relations_target
                ON relations(kind, target_id);

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn parse_record_id(raw: &str) -> StorageResult<RecordId> {
        RecordId::parse(raw).map_err(|e| StorageError::CorruptRow(format!("record id {raw:?}: {e}")))
    }

    fn parse_relation_kind(raw: &str) -> StorageResult<RelationKind> {
        RelationKind::from_str_opt(raw)
            .ok_or_else(|| StorageError::CorruptRow(format!("relation kind {raw:?}")))
    }

    fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::DateParse(e.to_string()))
    }

    /// Current edges with the given source
    fn query_edges_from(
        conn: &Connection,
        source: &RecordId,
    ) -> StorageResult<HashSet<RelationEdge>> {
        let mut stmt =
            conn.prepare("SELECT kind, target_id FROM relations WHERE source_id = ?1")?;
        let rows = stmt.query_map(params![source.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut edges = HashSet::new();
        for row in rows {
            let (kind, target) = row?;
            edges.insert(RelationEdge::new(
                Self::parse_relation_kind(&kind)?,
                *source,
                Self::parse_record_id(&target)?,
            ));
        }
        Ok(edges)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordStore for SqliteStore {
    // === Record Operations ===

    fn save_record(&self, record: &NormalizedRecord) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let record_json = serde_json::to_string(record)?;

        conn.execute(
            r#"
            INSERT INTO records (id, kind, control_number, record_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                control_number = excluded.control_number,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at
            "#,
            params![
                record.id.to_string(),
                record.kind.api_segment(),
                record.control_number.value() as i64,
                record_json,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn load_record(&self, id: &RecordId) -> StorageResult<Option<NormalizedRecord>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM records WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn load_by_control_number(
        &self,
        kind: RecordKind,
        control_number: ControlNumber,
    ) -> StorageResult<Option<NormalizedRecord>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM records WHERE kind = ?1 AND control_number = ?2",
                params![kind.api_segment(), control_number.value() as i64],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn resolve(
        &self,
        kind: RecordKind,
        control_number: ControlNumber,
    ) -> StorageResult<Option<RecordId>> {
        let conn = self.conn.lock().unwrap();
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM records WHERE kind = ?1 AND control_number = ?2",
                params![kind.api_segment(), control_number.value() as i64],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(raw) => Ok(Some(Self::parse_record_id(&raw)?)),
            None => Ok(None),
        }
    }

    // === Mirror Operations ===

    fn save_mirror(&self, mirror: &MirrorRecord) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();

        // Migrated rows are retained for audit and never refreshed.
        conn.execute(
            r#"
            INSERT INTO legacy_mirror (recid, raw, valid, error, migrated, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(recid) DO UPDATE SET
                raw = excluded.raw,
                valid = excluded.valid,
                error = excluded.error
            WHERE legacy_mirror.migrated = 0
            "#,
            params![
                mirror.recid.value() as i64,
                mirror.raw,
                mirror.valid,
                mirror.error,
                mirror.migrated,
                mirror.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn load_mirror(&self, recid: ControlNumber) -> StorageResult<Option<MirrorRecord>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(Vec<u8>, bool, Option<String>, bool, String)> = conn
            .query_row(
                "SELECT raw, valid, error, migrated, created_at
                 FROM legacy_mirror WHERE recid = ?1",
                params![recid.value() as i64],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((raw, valid, error, migrated, created_at)) => Ok(Some(MirrorRecord {
                recid,
                raw,
                valid,
                error,
                migrated,
                created_at: Self::parse_timestamp(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    fn all_mirror_recids(&self) -> StorageResult<Vec<ControlNumber>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT recid FROM legacy_mirror ORDER BY recid")?;
        let recids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|v| ControlNumber::new(v as u64)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recids)
    }

    fn pending_mirror_recids(&self) -> StorageResult<Vec<ControlNumber>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT recid FROM legacy_mirror WHERE migrated = 0 ORDER BY recid")?;
        let recids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|v| ControlNumber::new(v as u64)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recids)
    }

    fn set_mirror_migrated(&self, recid: ControlNumber) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE legacy_mirror SET migrated = 1, valid = 1, error = NULL WHERE recid = ?1",
            params![recid.value() as i64],
        )?;
        Ok(())
    }

    fn set_mirror_invalid(&self, recid: ControlNumber, error: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE legacy_mirror SET valid = 0, error = ?2 WHERE recid = ?1",
            params![recid.value() as i64, error],
        )?;
        Ok(())
    }

    fn mirror_stats(&self) -> StorageResult<MirrorStats> {
        let conn = self.conn.lock().unwrap();
        let (total, migrated, invalid): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(migrated), 0),
                    COALESCE(SUM(CASE WHEN valid = 0 THEN 1 ELSE 0 END), 0)
             FROM legacy_mirror",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(MirrorStats {
            total: total as usize,
            migrated: migrated as usize,
            invalid: invalid as usize,
        })
    }

    // === Relation Operations ===

    fn reconcile(
        &self,
        source: &RecordId,
        desired: &[RelationEdge],
    ) -> StorageResult<ReconcileOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::query_edges_from(&tx, source)?;
        let desired: HashSet<RelationEdge> = desired.iter().copied().collect();
        let delta = diff(&current, &desired);

        for edge in &delta.added {
            tx.execute(
                "INSERT OR IGNORE INTO relations (kind, source_id, target_id)
                 VALUES (?1, ?2, ?3)",
                params![
                    edge.kind.as_str(),
                    edge.source.to_string(),
                    edge.target.to_string()
                ],
            )?;
        }
        for edge in &delta.removed {
            tx.execute(
                "DELETE FROM relations WHERE kind = ?1 AND source_id = ?2 AND target_id = ?3",
                params![
                    edge.kind.as_str(),
                    edge.source.to_string(),
                    edge.target.to_string()
                ],
            )?;
        }

        tx.commit()?;

        Ok(ReconcileOutcome {
            inserted: delta.added.len(),
            removed: delta.removed.len(),
            changed_targets: delta.changed_targets(),
        })
    }

    fn edges_from(&self, source: &RecordId) -> StorageResult<Vec<RelationEdge>> {
        let conn = self.conn.lock().unwrap();
        let edges = Self::query_edges_from(&conn, source)?;
        Ok(edges.into_iter().collect())
    }

    fn edges_to(&self, kind: RelationKind, target: &RecordId) -> StorageResult<Vec<RelationEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source_id FROM relations WHERE kind = ?1 AND target_id = ?2",
        )?;
        let rows = stmt.query_map(params![kind.as_str(), target.to_string()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let source = Self::parse_record_id(&row?)?;
            edges.push(RelationEdge::new(kind, source, *target));
        }
        Ok(edges)
    }

    fn count_edges_to(&self, kind: RelationKind, target: &RecordId) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM relations WHERE kind = ?1 AND target_id = ?2",
            params![kind.as_str(), target.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // === Aggregate Operations ===

    fn recompute_aggregate(&self, target: &RecordId) -> StorageResult<AggregateOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let json: Option<String> = tx
            .query_row(
                "SELECT record_json FROM records WHERE id = ?1",
                params![target.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Ok(AggregateOutcome::Skipped);
        };

        let mut record: NormalizedRecord = serde_json::from_str(&json)?;
        let Some(kind) = RelationKind::counted_for(record.kind) else {
            return Ok(AggregateOutcome::Skipped);
        };

        let live: i64 = tx.query_row(
            "SELECT COUNT(*) FROM relations WHERE kind = ?1 AND target_id = ?2",
            params![kind.as_str(), target.to_string()],
            |row| row.get(0),
        )?;
        let live = live as u64;

        let previous = record.aggregate_value().unwrap_or(0);
        if previous == live {
            return Ok(AggregateOutcome::Unchanged);
        }

        record.set_aggregate_value(live);
        record.updated_at = Utc::now();
        tx.execute(
            "UPDATE records SET record_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(&record)?,
                record.updated_at.to_rfc3339(),
                target.to_string()
            ],
        )?;
        tx.commit()?;

        Ok(AggregateOutcome::Changed {
            previous,
            current: live,
        })
    }
}
