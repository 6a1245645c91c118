//! Record model: typed bibliographic records and their reference fields

mod metadata;
mod record;

pub use metadata::{
    Affiliation, AuthorEntry, PublicationInfo, RecordMetadata, RecordRef, Reference, ThesisInfo,
};
pub use record::{ControlNumber, NormalizedRecord, RecordId, RecordKind};
