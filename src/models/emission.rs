//! Items handed to the writer by the transform step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RecordUuids;

/// Type tag of every document object.
pub const DOCUMENT_TYPE: &str = "st:Document";

/// Relation type linking a document to its resolved address.
pub const RELATION_IN: &str = "st:in";

/// Separator between mortgager and address in display names.
pub const NAME_SEPARATOR: &str = " - ";

/// One unit of output, serialized as `{"type": ..., "obj": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "obj", rename_all = "lowercase")]
pub enum EmissionItem {
    Object(DocumentObject),
    Relation(Relation),
    Log(LogEntry),
}

impl EmissionItem {
    pub fn kind(&self) -> &'static str {
        match self {
            EmissionItem::Object(_) => "object",
            EmissionItem::Relation(_) => "relation",
            EmissionItem::Log(_) => "log",
        }
    }

    /// Identifier of the source record this item was derived from.
    pub fn record_id(&self) -> &str {
        match self {
            EmissionItem::Object(o) => &o.id,
            EmissionItem::Relation(r) => &r.from,
            EmissionItem::Log(l) => &l.id,
        }
    }
}

/// The document object emitted for every record that reaches the transform step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentObject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    pub data: DocumentData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

/// Payload of a document object.
///
/// Normalized fields are flattened into the payload next to images and UUIDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Value>,
    pub uuids: RecordUuids,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Relation {
    pub fn located_in(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: RELATION_IN.to_string(),
        }
    }
}

/// A geocoding failure recorded against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_envelope() {
        let item = EmissionItem::Relation(Relation::located_in("r1", "A1"));
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"type": "relation", "obj": {"from": "r1", "to": "A1", "type": "st:in"}})
        );
        assert_eq!(item.kind(), "relation");
        assert_eq!(item.record_id(), "r1");

        let log = EmissionItem::Log(LogEntry {
            id: "r2".to_string(),
            error: "nope".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&log).unwrap(),
            json!({"type": "log", "obj": {"id": "r2", "error": "nope"}})
        );
    }

    #[test]
    fn test_document_object_shape() {
        let mut fields = Map::new();
        fields.insert("mortgager".to_string(), json!("John Doe"));
        let object = DocumentObject {
            id: "r1".to_string(),
            kind: DOCUMENT_TYPE.to_string(),
            name: "John Doe - ".to_string(),
            valid_since: None,
            valid_until: None,
            data: DocumentData {
                images: None,
                uuids: RecordUuids::default(),
                address_id: Some("A1".to_string()),
                fields,
            },
            geometry: None,
        };

        let value = serde_json::to_value(&object).unwrap();
        assert_eq!(value["type"], json!("st:Document"));
        assert_eq!(value["data"]["addressId"], json!("A1"));
        assert_eq!(value["data"]["mortgager"], json!("John Doe"));
        assert!(value.get("validSince").is_none());
        assert!(value.get("geometry").is_none());
    }
}
