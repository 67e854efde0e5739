//! Records as written by the enrichment step.

use serde::{Deserialize, Serialize};

use super::{GeocodeOutcome, NormalizedFields, SourceRecord};

/// A source record augmented with its normalized fields and geocoding outcome.
///
/// Serialized flat: the original record's keys plus `fields` and, when an
/// address was geocoded, `geocode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: SourceRecord,
    #[serde(default)]
    pub fields: NormalizedFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocode: Option<GeocodeOutcome>,
}

impl EnrichedRecord {
    pub fn new(
        record: SourceRecord,
        fields: NormalizedFields,
        geocode: Option<GeocodeOutcome>,
    ) -> Self {
        Self {
            record,
            fields,
            geocode,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }
}
