//! Field extraction: export document entries to normalized fields.

use crate::models::{CanonicalField, FieldEntry, NormalizedFields};

/// Normalize a record's export fields.
///
/// Entries with unknown names or empty transformed values are dropped.
/// A canonical key seen more than once keeps every value, first seen first.
pub fn extract_fields(entries: &[FieldEntry]) -> NormalizedFields {
    entries
        .iter()
        .filter_map(|entry| {
            let field = CanonicalField::from_source_name(&entry.name)?;
            let value = field.transform(&entry.value)?;
            Some((field, value))
        })
        .fold(NormalizedFields::new(), |fields, (field, value)| {
            fields.with(field, value)
        })
}
