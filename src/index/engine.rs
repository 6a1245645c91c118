//! Search engine seam and the in-memory implementation

use crate::records::{ControlNumber, NormalizedRecord, RecordId, RecordKind};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the search engine collaborator
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search engine unavailable: {0}")]
    Unavailable(String),

    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The externally visible document for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: RecordId,
    pub control_number: ControlNumber,
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub stub: bool,
    #[serde(default)]
    pub citation_count: u64,
    #[serde(default)]
    pub number_of_contributions: u64,
    #[serde(default)]
    pub number_of_papers: u64,
}

impl IndexDocument {
    pub fn from_record(record: &NormalizedRecord) -> Self {
        Self {
            id: record.id,
            control_number: record.control_number,
            kind: record.kind,
            title: record.metadata.title.clone(),
            stub: record.stub,
            citation_count: record.citation_count,
            number_of_contributions: record.number_of_contributions,
            number_of_papers: record.number_of_papers,
        }
    }
}

/// The search engine collaborator contract.
///
/// Operations are idempotent: upserting the same document twice or deleting
/// an absent document is harmless, which makes reindex batches safely
/// retryable.
pub trait SearchEngine: Send + Sync {
    fn upsert(&self, doc: IndexDocument) -> Result<(), IndexError>;
    fn delete(&self, id: &RecordId) -> Result<(), IndexError>;
    fn refresh(&self) -> Result<(), IndexError>;
}

/// In-memory search index
///
/// Backs tests and the CLI; a production deployment would put a real search
/// cluster behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    docs: DashMap<RecordId, IndexDocument>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<IndexDocument> {
        self.docs.get(id).map(|d| d.clone())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl SearchEngine for InMemoryIndex {
    fn upsert(&self, doc: IndexDocument) -> Result<(), IndexError> {
        self.docs.insert(doc.id, doc);
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), IndexError> {
        // Absent documents are absorbed, not errors
        self.docs.remove(id);
        Ok(())
    }

    fn refresh(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
