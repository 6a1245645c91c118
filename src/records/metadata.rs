//! Reference-bearing record metadata
//!
//! Every field that can point at another record is declared explicitly;
//! the relation extractor walks exactly these fields and nothing else.

use super::record::{ControlNumber, RecordKind};
use serde::{Deserialize, Serialize};

/// A pointer to another record, by control number or by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ref", rename_all = "lowercase")]
pub enum RecordRef {
    ControlNumber { value: ControlNumber },
    Url { url: String },
}

impl RecordRef {
    pub fn control_number(value: impl Into<ControlNumber>) -> Self {
        Self::ControlNumber { value: value.into() }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Extract the target control number, checking URL references against the
    /// kind the surrounding field expects. A mismatched or unparseable URL
    /// yields `None`: an unlinked reference, not an error.
    pub fn target_control_number(&self, expected: RecordKind) -> Option<ControlNumber> {
        match self {
            Self::ControlNumber { value } => Some(*value),
            Self::Url { url } => {
                let mut segments = url.trim_end_matches('/').rsplit('/');
                let number: ControlNumber = segments.next()?.parse().ok()?;
                let kind = RecordKind::from_api_segment(segments.next()?)?;
                (kind == expected).then_some(number)
            }
        }
    }
}

/// An author attribution on a literature record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorEntry {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<Affiliation>,
}

/// A single author affiliation, optionally linked to an institution record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordRef>,
}

/// Where a literature record was published
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_record: Option<RecordRef>,
}

/// Thesis metadata, pointing at the granting institution(s)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThesisInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub institutions: Vec<RecordRef>,
}

/// One entry in a record's reference list (a citation it makes)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reference {
    /// The cited record, when the legacy reference carried a link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// Legacy status flags (tag 999 subfield `z`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_flags: Vec<String>,
}

/// The declared metadata of a normalized record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<AuthorEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publication_info: Vec<PublicationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thesis_info: Option<ThesisInfo>,
    /// Record-level affiliations, independent of any author entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_affiliations: Vec<RecordRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}
