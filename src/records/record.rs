//! Normalized record representation

use super::metadata::RecordMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic record UUIDs (v5 over kind + control number).
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x9f2c_1b8a_4d03_4e6b_a1c7_52e9_80fd_3b14);

/// Unique identifier for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new random RecordId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RecordId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derive the stable RecordId for a kind + control number pair.
    ///
    /// Migration uses this so re-migrating the same legacy record always
    /// lands on the same UUID.
    pub fn deterministic(kind: RecordKind, control_number: ControlNumber) -> Self {
        let name = format!("{}:{}", kind.collection_label(), control_number);
        Self(Uuid::new_v5(&RECORD_NAMESPACE, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a RecordId from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable human-facing integer identifier, distinct from the internal UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlNumber(u64);

impl ControlNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ControlNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ControlNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for ControlNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Record kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Literature,
    Author,
    Conference,
    Institution,
    Job,
    Journal,
    Experiment,
    Dataset,
}

impl RecordKind {
    /// Collection label used in legacy payloads (tag 980)
    pub fn collection_label(&self) -> &'static str {
        match self {
            Self::Literature => "HEP",
            Self::Author => "HEPNAMES",
            Self::Conference => "CONFERENCES",
            Self::Institution => "INSTITUTIONS",
            Self::Job => "JOBS",
            Self::Journal => "JOURNALS",
            Self::Experiment => "EXPERIMENT",
            Self::Dataset => "DATA",
        }
    }

    /// Map a legacy collection label to a kind
    pub fn from_collection(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "HEP" => Some(Self::Literature),
            "HEPNAMES" => Some(Self::Author),
            "CONFERENCES" => Some(Self::Conference),
            "INSTITUTIONS" => Some(Self::Institution),
            "JOBS" => Some(Self::Job),
            "JOURNALS" => Some(Self::Journal),
            "EXPERIMENT" => Some(Self::Experiment),
            "DATA" => Some(Self::Dataset),
            _ => None,
        }
    }

    /// Path segment used in URL references (`…/api/<segment>/<control_number>`)
    pub fn api_segment(&self) -> &'static str {
        match self {
            Self::Literature => "literature",
            Self::Author => "authors",
            Self::Conference => "conferences",
            Self::Institution => "institutions",
            Self::Job => "jobs",
            Self::Journal => "journals",
            Self::Experiment => "experiments",
            Self::Dataset => "data",
        }
    }

    /// Map a URL path segment to a kind
    pub fn from_api_segment(segment: &str) -> Option<Self> {
        match segment {
            "literature" => Some(Self::Literature),
            "authors" => Some(Self::Author),
            "conferences" => Some(Self::Conference),
            "institutions" => Some(Self::Institution),
            "jobs" => Some(Self::Job),
            "journals" => Some(Self::Journal),
            "experiments" => Some(Self::Experiment),
            "data" => Some(Self::Dataset),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_segment())
    }
}

/// A typed bibliographic record.
///
/// Records are mutated in place for aggregate updates and never physically
/// removed; deletion flips the `deleted` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Internal identifier
    pub id: RecordId,
    /// Human-facing identifier
    pub control_number: ControlNumber,
    /// Record kind
    pub kind: RecordKind,
    /// Reference-bearing metadata
    pub metadata: RecordMetadata,
    /// Citations pointing at this record (literature only)
    #[serde(default)]
    pub citation_count: u64,
    /// Papers reporting this conference (conferences only)
    #[serde(default)]
    pub number_of_contributions: u64,
    /// Papers affiliated with this institution (institutions only)
    #[serde(default)]
    pub number_of_papers: u64,
    /// Author record created without full identity resolution
    #[serde(default)]
    pub stub: bool,
    /// Record flagged as deleted
    #[serde(default)]
    pub deleted: bool,
    /// When the record was first created
    pub created_at: DateTime<Utc>,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl NormalizedRecord {
    /// Create a record with the deterministic UUID for its kind + control number
    pub fn new(kind: RecordKind, control_number: ControlNumber) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::deterministic(kind, control_number),
            control_number,
            kind,
            metadata: RecordMetadata::default(),
            citation_count: 0,
            number_of_contributions: 0,
            number_of_papers: 0,
            stub: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The stored aggregate value this record carries, if its kind has one
    pub fn aggregate_value(&self) -> Option<u64> {
        match self.kind {
            RecordKind::Literature => Some(self.citation_count),
            RecordKind::Conference => Some(self.number_of_contributions),
            RecordKind::Institution => Some(self.number_of_papers),
            _ => None,
        }
    }

    /// Overwrite the aggregate value for this record's kind
    pub fn set_aggregate_value(&mut self, value: u64) {
        match self.kind {
            RecordKind::Literature => self.citation_count = value,
            RecordKind::Conference => self.number_of_contributions = value,
            RecordKind::Institution => self.number_of_papers = value,
            _ => {}
        }
    }
}
