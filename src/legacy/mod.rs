//! Legacy record intake: tagged-field payloads, the mirror model, and the
//! transformer that turns raw payloads into normalized records

mod fields;
mod mirror;
mod transform;

pub use fields::{parse_fields, split_payloads, FieldValue, RawField, ValidationError};
pub use mirror::MirrorRecord;
pub use transform::{LegacyTransformer, RecordTransformer};
