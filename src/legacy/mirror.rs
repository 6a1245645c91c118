//! Legacy mirror record: raw payload plus validation state
//!
//! Mirror rows are the source of truth before migration. The raw payload is
//! immutable after insert; only the validation/migration state changes.

use super::fields::{parse_fields, ValidationError};
use crate::records::ControlNumber;
use chrono::{DateTime, Utc};

/// A raw legacy record held in the mirror store.
#[derive(Debug, Clone)]
pub struct MirrorRecord {
    /// Legacy control number, parsed eagerly at intake
    pub recid: ControlNumber,
    /// The untouched payload bytes, retained for audit
    pub raw: Vec<u8>,
    /// Whether the last transform attempt succeeded (or none was made yet)
    pub valid: bool,
    /// Error detail from the last failed transform attempt
    pub error: Option<String>,
    /// Whether a normalized record has been produced from this row
    pub migrated: bool,
    pub created_at: DateTime<Utc>,
}

impl MirrorRecord {
    /// Build a mirror row from a raw payload.
    ///
    /// Only the control number is parsed here; a payload without a usable
    /// tag 001 cannot be keyed and is rejected outright.
    pub fn from_payload(raw: Vec<u8>) -> Result<Self, ValidationError> {
        let fields = parse_fields(&raw)?;
        let bare = fields
            .iter()
            .find(|f| f.tag == "001")
            .and_then(|f| f.bare())
            .ok_or(ValidationError::MissingControlNumber)?;
        let recid: ControlNumber = bare
            .parse()
            .map_err(|_| ValidationError::InvalidControlNumber(bare.to_string()))?;

        Ok(Self {
            recid,
            raw,
            valid: true,
            error: None,
            migrated: false,
            created_at: Utc::now(),
        })
    }
}
