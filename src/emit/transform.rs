//! Deriving emission items from an enriched record.

use crate::models::{
    CanonicalField, DocumentData, DocumentObject, EmissionItem, EnrichedRecord, GeocodeOutcome,
    LogEntry, RecordUuids, Relation, DOCUMENT_TYPE, NAME_SEPARATOR,
};

/// The items one record produces, before flattening.
///
/// `relation` and `log` are never both set: a record either geocoded,
/// failed to geocode, or had nothing to geocode.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordItems {
    pub object: DocumentObject,
    pub relation: Option<Relation>,
    pub log: Option<LogEntry>,
}

impl RecordItems {
    /// Items in delivery order: document, then relation or log.
    pub fn into_items(self) -> impl Iterator<Item = EmissionItem> {
        [
            Some(EmissionItem::Object(self.object)),
            self.relation.map(EmissionItem::Relation),
            self.log.map(EmissionItem::Log),
        ]
        .into_iter()
        .flatten()
    }
}

/// Build the document object and its relation or log for `enriched`.
pub fn derive_items(enriched: &EnrichedRecord) -> RecordItems {
    let record = &enriched.record;
    let fields = &enriched.fields;
    let matched = enriched.geocode.as_ref().and_then(GeocodeOutcome::matched);

    let name = [
        fields.first_text(CanonicalField::Mortgager).unwrap_or_default(),
        fields.first_text(CanonicalField::Address).unwrap_or_default(),
    ]
    .join(NAME_SEPARATOR);
    let date = fields.first_text(CanonicalField::Date);

    let object = DocumentObject {
        id: record.id.clone(),
        kind: DOCUMENT_TYPE.to_string(),
        name,
        valid_since: date.clone(),
        valid_until: date,
        data: DocumentData {
            images: record.images().cloned(),
            uuids: RecordUuids::from(&record.meta_data),
            address_id: matched.map(|m| m.address_id().to_string()),
            fields: fields.to_json_map(),
        },
        geometry: matched.and_then(|m| m.geometry.clone()),
    };

    let relation = matched.map(|m| Relation::located_in(&record.id, m.address_id()));

    let log = match &enriched.geocode {
        Some(GeocodeOutcome::NotFound { error }) => Some(LogEntry {
            id: record.id.clone(),
            error: error.clone(),
        }),
        _ => None,
    };

    RecordItems {
        object,
        relation,
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_fields;
    use crate::models::{GeocodeMatch, SourceRecord};
    use serde_json::json;

    fn enriched(geocode: Option<GeocodeOutcome>) -> EnrichedRecord {
        let record: SourceRecord = serde_json::from_value(json!({
            "id": "rec-1",
            "meta_data": {"capture_uuid": "cap", "page_uri": "page", "book_uri": "book"},
            "subjects": [{"location": {"standard": "https://img/1.jpg"}}],
            "export_document": {"export_fields": [
                {"name": "Mortgager", "value": "John Doe"},
                {"name": "Street Address", "value": "12 Main St"},
                {"name": "Record Date", "value": "1850-03-02T00:00:00Z"}
            ]}
        }))
        .unwrap();
        let fields = extract_fields(record.export_fields());
        EnrichedRecord::new(record, fields, geocode)
    }

    #[test]
    fn test_found_yields_document_and_relation() {
        let geometry = json!({"type": "Point", "coordinates": [-74.0, 40.7]});
        let items = derive_items(&enriched(Some(GeocodeOutcome::Found(GeocodeMatch::new(
            "A1",
            Some(geometry.clone()),
        )))));

        assert_eq!(items.object.name, "John Doe - 12 Main St");
        assert_eq!(items.object.valid_since.as_deref(), Some("1850-03-02"));
        assert_eq!(items.object.valid_until.as_deref(), Some("1850-03-02"));
        assert_eq!(items.object.data.address_id.as_deref(), Some("A1"));
        assert_eq!(items.object.geometry, Some(geometry));
        assert_eq!(items.relation, Some(Relation::located_in("rec-1", "A1")));
        assert!(items.log.is_none());

        let data = serde_json::to_value(&items.object.data).unwrap();
        assert_eq!(data["images"], json!({"standard": "https://img/1.jpg"}));
        assert_eq!(data["uuids"], json!({"capture": "cap", "page": "page", "book": "book"}));
        assert_eq!(data["mortgager"], json!("John Doe"));
        assert_eq!(data["date"], json!("1850-03-02"));
    }

    #[test]
    fn test_not_found_yields_document_and_log() {
        let items = derive_items(&enriched(Some(GeocodeOutcome::NotFound {
            error: "no match".to_string(),
        })));

        assert!(items.relation.is_none());
        assert_eq!(
            items.log,
            Some(LogEntry {
                id: "rec-1".to_string(),
                error: "no match".to_string()
            })
        );
        assert!(items.object.data.address_id.is_none());
        assert!(items.object.geometry.is_none());
    }

    #[test]
    fn test_no_outcome_yields_only_document() {
        let items: Vec<EmissionItem> = derive_items(&enriched(None)).into_items().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind(), "object");
    }

    #[test]
    fn test_item_order_document_first() {
        let kinds: Vec<&str> = derive_items(&enriched(Some(GeocodeOutcome::Found(
            GeocodeMatch::new("A1", None),
        ))))
        .into_items()
        .map(|i| i.kind())
        .collect();
        assert_eq!(kinds, vec!["object", "relation"]);
    }

    #[test]
    fn test_name_with_missing_parts() {
        let record: SourceRecord = serde_json::from_value(json!({
            "id": "rec-2",
            "export_document": {"export_fields": [{"name": "Street Address", "value": "9 Elm St"}]}
        }))
        .unwrap();
        let fields = extract_fields(record.export_fields());
        let items = derive_items(&EnrichedRecord::new(record, fields, None));

        assert_eq!(items.object.name, " - 9 Elm St");
        assert!(items.object.valid_since.is_none());
        assert!(items.object.data.images.is_none());
    }
}
