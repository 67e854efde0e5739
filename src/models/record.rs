//! Source records as they appear inside the Emigrant City data archive.
//!
//! Only the parts of a record the pipeline reads are typed. Everything else
//! is kept in `extra` maps so a record survives a parse/serialize round trip
//! through the intermediate stores unchanged.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One transcribed record from the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Opaque record identifier. Numeric ids are kept as their decimal text.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Capture, page and book identifiers.
    #[serde(default)]
    pub meta_data: MetaData,
    /// Subjects marked on the page; the first one carries the image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<Subject>>,
    /// Field-tagged transcription. Records without one are dropped downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_document: Option<ExportDocument>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceRecord {
    /// Whether this record takes part in enrichment and emission.
    pub fn has_export_document(&self) -> bool {
        self.export_document.is_some()
    }

    /// Export fields in document order (empty when there is no export document).
    pub fn export_fields(&self) -> &[FieldEntry] {
        self.export_document
            .as_ref()
            .map(|doc| doc.export_fields.as_slice())
            .unwrap_or(&[])
    }

    /// Image location of the first subject, if any.
    pub fn images(&self) -> Option<&Value> {
        self.subjects
            .as_ref()
            .and_then(|subjects| subjects.first())
            .and_then(|subject| subject.location.as_ref())
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "record id must be a string or a number, got {}",
            other
        ))),
    }
}

/// Identifiers linking a record back to its scanned page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The structured payload of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default)]
    pub export_fields: Vec<FieldEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single `(name, value)` pair of an export document.
///
/// Values are kept as raw JSON: most are strings, while compound fields such
/// as dimensions arrive as objects of sub-fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl FieldEntry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The `{capture, page, book}` identifier triple carried into document data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordUuids {
    pub capture: Option<String>,
    pub page: Option<String>,
    pub book: Option<String>,
}

impl From<&MetaData> for RecordUuids {
    fn from(meta: &MetaData) -> Self {
        Self {
            capture: meta.capture_uuid.clone(),
            page: meta.page_uri.clone(),
            book: meta.book_uri.clone(),
        }
    }
}
