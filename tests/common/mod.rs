//! Common test utilities
//!
//! Shared builders for records with reference fields and a fully wired
//! pipeline stack over an in-memory store and index.

#![allow(dead_code)]

use citegraph::records::{Affiliation, AuthorEntry, PublicationInfo, Reference, ThesisInfo};
use citegraph::{
    ControlNumber, InMemoryIndex, LocalQueue, NormalizedRecord, OpenStore, Orchestrator, Pipeline,
    RecordKind, RecordRef, RecordStore, SqliteStore,
};
use std::sync::Arc;

/// A fully wired stack: store, index, pipeline, and orchestrator over a
/// local worker pool.
pub struct TestStack {
    pub store: Arc<SqliteStore>,
    pub engine: Arc<InMemoryIndex>,
    pub pipeline: Arc<Pipeline>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn stack() -> TestStack {
    stack_with_workers(2)
}

pub fn stack_with_workers(workers: usize) -> TestStack {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let engine = Arc::new(InMemoryIndex::new());
    let pipeline = Arc::new(Pipeline::new(store.clone(), engine.clone()));
    let queue = LocalQueue::start(pipeline.clone(), workers);
    let orchestrator = Arc::new(Orchestrator::new(queue).with_floor_chunk_size(2));

    TestStack {
        store,
        engine,
        pipeline,
        orchestrator,
    }
}

pub fn literature(cn: u64) -> NormalizedRecord {
    NormalizedRecord::new(RecordKind::Literature, ControlNumber::new(cn))
}

pub fn conference(cn: u64) -> NormalizedRecord {
    NormalizedRecord::new(RecordKind::Conference, ControlNumber::new(cn))
}

pub fn institution(cn: u64) -> NormalizedRecord {
    NormalizedRecord::new(RecordKind::Institution, ControlNumber::new(cn))
}

pub fn record_of_kind(kind: RecordKind, cn: u64) -> NormalizedRecord {
    NormalizedRecord::new(kind, ControlNumber::new(cn))
}

/// Literature citing the given control numbers.
pub fn literature_citing(cn: u64, cited: &[u64]) -> NormalizedRecord {
    let mut record = literature(cn);
    for target in cited {
        record.metadata.references.push(Reference {
            record: Some(RecordRef::control_number(*target)),
            ..Default::default()
        });
    }
    record
}

/// Literature whose publication info reports the given conference.
pub fn literature_at_conference(cn: u64, conference_cn: u64) -> NormalizedRecord {
    let mut record = literature(cn);
    record.metadata.publication_info.push(PublicationInfo {
        journal_title: None,
        conference_record: Some(RecordRef::control_number(conference_cn)),
    });
    record
}

/// Literature with an author affiliated to the given institution.
pub fn literature_with_author_affiliation(cn: u64, institution_cn: u64) -> NormalizedRecord {
    let mut record = literature(cn);
    record.metadata.authors.push(AuthorEntry {
        full_name: "John Doe".into(),
        affiliations: vec![Affiliation {
            label: Some("Institution".into()),
            record: Some(RecordRef::control_number(institution_cn)),
        }],
    });
    record
}

/// Literature whose thesis info names the given institution.
pub fn literature_with_thesis_institution(cn: u64, institution_cn: u64) -> NormalizedRecord {
    let mut record = literature(cn);
    record.metadata.thesis_info = Some(ThesisInfo {
        degree_type: Some("PhD".into()),
        institutions: vec![RecordRef::control_number(institution_cn)],
    });
    record
}

/// Literature with a record-level affiliation to the given institution.
pub fn literature_with_record_affiliation(cn: u64, institution_cn: u64) -> NormalizedRecord {
    let mut record = literature(cn);
    record
        .metadata
        .record_affiliations
        .push(RecordRef::control_number(institution_cn));
    record
}

/// Save the given records into the stack's store.
pub fn save_all(stack: &TestStack, records: &[&NormalizedRecord]) {
    for record in records {
        stack.store.save_record(record).unwrap();
    }
}

/// Expected echo result for a batch.
pub fn as_strings(records: &[&NormalizedRecord]) -> Vec<String> {
    records.iter().map(|r| r.id.to_string()).collect()
}
