//! Data models for the Emigrant City pipeline.

mod emission;
mod enriched;
mod fields;
mod geocode;
mod record;

pub use emission::{
    DocumentData, DocumentObject, EmissionItem, LogEntry, Relation, DOCUMENT_TYPE,
    NAME_SEPARATOR, RELATION_IN,
};
pub use enriched::EnrichedRecord;
pub use fields::{
    is_empty_value, truncate_date, CanonicalField, Dimensions, FieldValue, NormalizedFields,
    Properties,
};
pub use geocode::{AddressRef, GeocodeMatch, GeocodeOutcome, MatchProperties};
pub use record::{ExportDocument, FieldEntry, MetaData, RecordUuids, SourceRecord, Subject};
