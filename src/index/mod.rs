//! Search index integration: document building, the engine seam, and the
//! reindex-driving indexer

mod engine;
mod indexer;

pub use engine::{IndexDocument, IndexError, InMemoryIndex, SearchEngine};
pub use indexer::{RecordIndexer, RetryPolicy};
