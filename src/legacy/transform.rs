//! Record Transformer: raw legacy payload → normalized record
//!
//! The transformer is a collaborator seam; the migrator only sees the
//! trait. `LegacyTransformer` implements the tagged-field interchange
//! format described in `fields`.

use super::fields::{parse_fields, RawField, ValidationError};
use crate::records::{
    Affiliation, AuthorEntry, ControlNumber, NormalizedRecord, PublicationInfo, RecordKind,
    RecordMetadata, RecordRef, Reference, ThesisInfo,
};

/// Converts a raw legacy payload into a normalized record, or reports why
/// it can't be.
pub trait RecordTransformer: Send + Sync {
    fn normalize(&self, raw: &[u8]) -> Result<NormalizedRecord, ValidationError>;
}

/// The default transformer for tagged-field legacy payloads.
#[derive(Debug, Default)]
pub struct LegacyTransformer;

impl LegacyTransformer {
    pub fn new() -> Self {
        Self
    }

    fn control_number(fields: &[RawField]) -> Result<ControlNumber, ValidationError> {
        let bare = fields
            .iter()
            .find(|f| f.tag == "001")
            .and_then(|f| f.bare())
            .ok_or(ValidationError::MissingControlNumber)?;
        bare.parse()
            .map_err(|_| ValidationError::InvalidControlNumber(bare.to_string()))
    }

    fn kind(fields: &[RawField]) -> Result<RecordKind, ValidationError> {
        let mut saw_label = None;
        for field in fields.iter().filter(|f| f.tag == "980") {
            for label in field.subfields('a') {
                if let Some(kind) = RecordKind::from_collection(label) {
                    return Ok(kind);
                }
                saw_label.get_or_insert_with(|| label.to_string());
            }
        }
        match saw_label {
            Some(label) => Err(ValidationError::UnknownCollection(label)),
            None => Err(ValidationError::MissingCollection),
        }
    }

    fn status_marker(fields: &[RawField], marker: &str) -> bool {
        fields
            .iter()
            .filter(|f| f.tag == "980")
            .flat_map(|f| f.subfields('c'))
            .any(|v| v.eq_ignore_ascii_case(marker))
    }

    fn author_entry(field: &RawField) -> Option<AuthorEntry> {
        let full_name = field.subfield('a')?.to_string();
        let mut affiliations = Vec::new();
        let labels = field.subfields('u');
        for (idx, raw_cn) in field.subfields('z').iter().enumerate() {
            let record = raw_cn
                .parse::<ControlNumber>()
                .ok()
                .map(|cn| RecordRef::control_number(cn.value()));
            affiliations.push(Affiliation {
                label: labels.get(idx).map(|l| l.to_string()),
                record,
            });
        }
        // An affiliation label with no linked record is still an affiliation.
        for label in labels.iter().skip(affiliations.len()) {
            affiliations.push(Affiliation {
                label: Some(label.to_string()),
                record: None,
            });
        }
        Some(AuthorEntry {
            full_name,
            affiliations,
        })
    }

    fn reference(field: &RawField) -> Result<Reference, ValidationError> {
        let year = match field.subfield('y') {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|_| ValidationError::InvalidYear(raw.to_string()))?,
            ),
            None => None,
        };
        Ok(Reference {
            record: field
                .subfield('0')
                .and_then(|v| v.parse::<ControlNumber>().ok())
                .map(|cn| RecordRef::control_number(cn.value())),
            author_label: field.subfield('h').map(str::to_string),
            citation_text: field.subfield('s').map(str::to_string),
            year,
            status_flags: field.subfields('z').iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl RecordTransformer for LegacyTransformer {
    fn normalize(&self, raw: &[u8]) -> Result<NormalizedRecord, ValidationError> {
        let fields = parse_fields(raw)?;

        let control_number = Self::control_number(&fields)?;
        let kind = Self::kind(&fields)?;

        let mut metadata = RecordMetadata::default();
        let mut thesis_institutions = Vec::new();
        let mut degree_type = None;

        for field in &fields {
            match field.tag.as_str() {
                "245" => {
                    if let Some(title) = field.subfield('a') {
                        metadata.title = Some(title.to_string());
                    }
                }
                "100" | "700" => {
                    if let Some(entry) = Self::author_entry(field) {
                        metadata.authors.push(entry);
                    }
                }
                "502" => {
                    if let Some(degree) = field.subfield('b') {
                        degree_type = Some(degree.to_string());
                    }
                    for raw_cn in field.subfields('z') {
                        if let Ok(cn) = raw_cn.parse::<ControlNumber>() {
                            thesis_institutions.push(RecordRef::control_number(cn.value()));
                        }
                    }
                }
                "773" => {
                    metadata.publication_info.push(PublicationInfo {
                        journal_title: field.subfield('p').map(str::to_string),
                        conference_record: field
                            .subfield('w')
                            .and_then(|v| v.parse::<ControlNumber>().ok())
                            .map(|cn| RecordRef::control_number(cn.value())),
                    });
                }
                "902" => {
                    for raw_cn in field.subfields('z') {
                        if let Ok(cn) = raw_cn.parse::<ControlNumber>() {
                            metadata
                                .record_affiliations
                                .push(RecordRef::control_number(cn.value()));
                        }
                    }
                }
                tag if tag.starts_with("999") => {
                    metadata.references.push(Self::reference(field)?);
                }
                _ => {}
            }
        }

        if degree_type.is_some() || !thesis_institutions.is_empty() {
            metadata.thesis_info = Some(ThesisInfo {
                degree_type,
                institutions: thesis_institutions,
            });
        }

        let mut record = NormalizedRecord::new(kind, control_number).with_metadata(metadata);
        record.deleted = Self::status_marker(&fields, "DELETED");
        record.stub = kind == RecordKind::Author && Self::status_marker(&fields, "STUB");
        Ok(record)
    }
}
