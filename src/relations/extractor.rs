//! Relation Extractor: a record's content → the edges it should have

use super::edge::{RelationEdge, RelationKind};
use crate::records::{NormalizedRecord, RecordId, RecordKind, RecordRef};
use crate::storage::{RecordStore, StorageResult};
use std::collections::HashSet;
use tracing::debug;

/// Derives the complete outbound edge set a record supports.
///
/// References that don't resolve to an existing record are unlinked: they
/// are omitted from the edge set, never an error.
pub struct RelationExtractor<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> RelationExtractor<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// The edges this record's current content asserts.
    ///
    /// Deleted records and non-literature kinds assert nothing, so
    /// reconciling them withdraws any previously stored outbound edges.
    pub fn desired_edges(&self, record: &NormalizedRecord) -> StorageResult<Vec<RelationEdge>> {
        if record.deleted || record.kind != RecordKind::Literature {
            return Ok(Vec::new());
        }

        let mut edges: HashSet<RelationEdge> = HashSet::new();

        for reference in &record.metadata.references {
            if let Some(target) = self.resolve(reference.record.as_ref(), RecordKind::Literature)? {
                // Self-citations are never recorded.
                if target != record.id {
                    edges.insert(RelationEdge::new(RelationKind::Citation, record.id, target));
                }
            }
        }

        for info in &record.metadata.publication_info {
            if let Some(target) =
                self.resolve(info.conference_record.as_ref(), RecordKind::Conference)?
            {
                edges.insert(RelationEdge::new(
                    RelationKind::ConferenceContribution,
                    record.id,
                    target,
                ));
            }
        }

        for target in self.affiliated_institutions(record)? {
            edges.insert(RelationEdge::new(
                RelationKind::InstitutionAffiliation,
                record.id,
                target,
            ));
        }

        Ok(edges.into_iter().collect())
    }

    /// Institutions referenced anywhere on the record: author affiliations,
    /// thesis info, and record-level affiliations, deduplicated.
    fn affiliated_institutions(
        &self,
        record: &NormalizedRecord,
    ) -> StorageResult<HashSet<RecordId>> {
        let mut institutions = HashSet::new();

        let author_refs = record
            .metadata
            .authors
            .iter()
            .flat_map(|a| a.affiliations.iter())
            .filter_map(|aff| aff.record.as_ref());
        let thesis_refs = record
            .metadata
            .thesis_info
            .iter()
            .flat_map(|t| t.institutions.iter());
        let record_refs = record.metadata.record_affiliations.iter();

        for reference in author_refs.chain(thesis_refs).chain(record_refs) {
            if let Some(target) = self.resolve(Some(reference), RecordKind::Institution)? {
                institutions.insert(target);
            }
        }

        Ok(institutions)
    }

    fn resolve(
        &self,
        reference: Option<&RecordRef>,
        expected: RecordKind,
    ) -> StorageResult<Option<RecordId>> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        let Some(control_number) = reference.target_control_number(expected) else {
            debug!(?reference, kind = %expected, "reference does not address this kind");
            return Ok(None);
        };
        let resolved = self.store.resolve(expected, control_number)?;
        if resolved.is_none() {
            debug!(%control_number, kind = %expected, "unlinked reference");
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        Affiliation, AuthorEntry, ControlNumber, PublicationInfo, Reference, ThesisInfo,
    };
    use crate::storage::{OpenStore, SqliteStore};

    fn store_with(records: &[&NormalizedRecord]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for record in records {
            store.save_record(record).unwrap();
        }
        store
    }

    fn literature(cn: u64) -> NormalizedRecord {
        NormalizedRecord::new(RecordKind::Literature, ControlNumber::new(cn))
    }

    fn citation_to(cn: u64) -> Reference {
        Reference {
            record: Some(RecordRef::control_number(cn)),
            ..Default::default()
        }
    }

    #[test]
    fn extracts_citation_edges() {
        let cited = literature(667);
        let mut citer = literature(666);
        citer.metadata.references.push(citation_to(667));

        let store = store_with(&[&cited, &citer]);
        let edges = RelationExtractor::new(&store).desired_edges(&citer).unwrap();

        assert_eq!(
            edges,
            vec![RelationEdge::new(RelationKind::Citation, citer.id, cited.id)]
        );
    }

    #[test]
    fn unresolved_reference_is_omitted() {
        let mut citer = literature(666);
        citer.metadata.references.push(citation_to(999));

        let store = store_with(&[&citer]);
        let edges = RelationExtractor::new(&store).desired_edges(&citer).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn self_citation_is_skipped() {
        let mut record = literature(666);
        record.metadata.references.push(citation_to(666));

        let store = store_with(&[&record]);
        let edges = RelationExtractor::new(&store).desired_edges(&record).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn institution_edges_union_all_three_fields_and_deduplicate() {
        let institution =
            NormalizedRecord::new(RecordKind::Institution, ControlNumber::new(903));

        let mut record = literature(1);
        record.metadata.authors.push(AuthorEntry {
            full_name: "John Doe".into(),
            affiliations: vec![Affiliation {
                label: Some("Institution".into()),
                record: Some(RecordRef::control_number(903u64)),
            }],
        });
        record.metadata.thesis_info = Some(ThesisInfo {
            degree_type: None,
            institutions: vec![RecordRef::control_number(903u64)],
        });
        record
            .metadata
            .record_affiliations
            .push(RecordRef::control_number(903u64));

        let store = store_with(&[&institution, &record]);
        let edges = RelationExtractor::new(&store).desired_edges(&record).unwrap();

        assert_eq!(
            edges,
            vec![RelationEdge::new(
                RelationKind::InstitutionAffiliation,
                record.id,
                institution.id
            )]
        );
    }

    #[test]
    fn conference_edge_from_url_reference() {
        let conference =
            NormalizedRecord::new(RecordKind::Conference, ControlNumber::new(555));
        let mut record = literature(1);
        record.metadata.publication_info.push(PublicationInfo {
            journal_title: None,
            conference_record: Some(RecordRef::url(
                "http://localhost:8000/api/conferences/555",
            )),
        });

        let store = store_with(&[&conference, &record]);
        let edges = RelationExtractor::new(&store).desired_edges(&record).unwrap();

        assert_eq!(
            edges,
            vec![RelationEdge::new(
                RelationKind::ConferenceContribution,
                record.id,
                conference.id
            )]
        );
    }

    #[test]
    fn deleted_record_asserts_no_edges() {
        let cited = literature(667);
        let mut citer = literature(666);
        citer.metadata.references.push(citation_to(667));
        citer.deleted = true;

        let store = store_with(&[&cited, &citer]);
        let edges = RelationExtractor::new(&store).desired_edges(&citer).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn non_literature_record_asserts_no_edges() {
        let mut author = NormalizedRecord::new(RecordKind::Author, ControlNumber::new(5));
        author.metadata.references.push(citation_to(667));

        let store = store_with(&[&author]);
        let edges = RelationExtractor::new(&store).desired_edges(&author).unwrap();
        assert!(edges.is_empty());
    }
}
