//! Relation edges between records

use crate::records::{RecordId, RecordKind};
use serde::{Deserialize, Serialize};

/// The three maintained relation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Literature cites literature
    Citation,
    /// Literature reports a conference
    ConferenceContribution,
    /// Literature is affiliated with an institution
    InstitutionAffiliation,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citation => "citation",
            Self::ConferenceContribution => "conference_contribution",
            Self::InstitutionAffiliation => "institution_affiliation",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "citation" => Some(Self::Citation),
            "conference_contribution" => Some(Self::ConferenceContribution),
            "institution_affiliation" => Some(Self::InstitutionAffiliation),
            _ => None,
        }
    }

    /// The record kind an edge of this relation points at
    pub fn target_kind(&self) -> RecordKind {
        match self {
            Self::Citation => RecordKind::Literature,
            Self::ConferenceContribution => RecordKind::Conference,
            Self::InstitutionAffiliation => RecordKind::Institution,
        }
    }

    /// The relation whose inbound edges a record kind counts, if any.
    ///
    /// Drives the aggregate fields: literature counts citations, conferences
    /// count contributions, institutions count affiliated papers.
    pub fn counted_for(kind: RecordKind) -> Option<Self> {
        match kind {
            RecordKind::Literature => Some(Self::Citation),
            RecordKind::Conference => Some(Self::ConferenceContribution),
            RecordKind::Institution => Some(Self::InstitutionAffiliation),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed relation instance.
///
/// `source` is always the record whose content asserts the edge; `target`
/// carries the aggregate. Uniqueness holds on the full triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEdge {
    pub kind: RelationKind,
    pub source: RecordId,
    pub target: RecordId,
}

impl RelationEdge {
    pub fn new(kind: RelationKind, source: RecordId, target: RecordId) -> Self {
        Self { kind, source, target }
    }
}
