//! Citegraph: bibliographic record migration and relation-graph maintenance
//!
//! Ingests legacy bibliographic records and continuously maintains a derived
//! relation graph (who cites whom, which papers belong to which conference,
//! which institutions are affiliated with which papers) plus the
//! denormalized counters those relations imply, propagating changes into a
//! search index.
//!
//! # Core Concepts
//!
//! - **Records**: typed documents (literature, authors, conferences, …)
//!   identified by a UUID and a human-facing control number
//! - **Relations**: unique directed edges derived purely from record content
//! - **Aggregates**: stored counters that always converge to live edge counts
//! - **Stages**: idempotent batch units (extract → reconcile → aggregate →
//!   reindex) dispatched over a worker pool
//!
//! # Example
//!
//! ```
//! use citegraph::{InMemoryIndex, OpenStore, Pipeline, SqliteStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let engine = Arc::new(InMemoryIndex::new());
//! let pipeline = Pipeline::new(store, engine);
//! // Pipeline is ready to process UUID batches
//! ```

pub mod aggregate;
pub mod config;
pub mod index;
pub mod legacy;
pub mod migrate;
pub mod pipeline;
pub mod records;
pub mod relations;
pub mod storage;

pub use aggregate::Aggregator;
pub use config::{Config, ConfigError};
pub use index::{IndexDocument, IndexError, InMemoryIndex, RecordIndexer, RetryPolicy, SearchEngine};
pub use legacy::{LegacyTransformer, MirrorRecord, RecordTransformer, ValidationError};
pub use migrate::{MigrationError, MigrationSummary, Migrator, MirrorSelector, PopulateSummary};
pub use pipeline::{
    DispatchError, LocalQueue, Orchestrator, Pipeline, PipelineError, Stage, TaskHandle, TaskQueue,
};
pub use records::{ControlNumber, NormalizedRecord, RecordId, RecordKind, RecordMetadata, RecordRef};
pub use relations::{RelationEdge, RelationExtractor, RelationKind};
pub use storage::{
    AggregateOutcome, MirrorStats, OpenStore, RecordStore, SqliteStore, StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
