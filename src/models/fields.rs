//! Canonical field vocabulary and normalized field values.
//!
//! Export documents tag their values with human-readable names such as
//! `"Street Address"`. Each known name maps to one [`CanonicalField`], and
//! each canonical field owns a total transformation from the raw JSON value
//! to a [`FieldValue`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fixed set of normalized keys produced by field extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    Mortgager,
    Address,
    Date,
    AmountLoaned,
    Valuation,
    RecordNumber,
    Dimensions,
    Properties,
    AdditionalInfo,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        Self::Mortgager,
        Self::Address,
        Self::Date,
        Self::AmountLoaned,
        Self::Valuation,
        Self::RecordNumber,
        Self::Dimensions,
        Self::Properties,
        Self::AdditionalInfo,
    ];

    /// Key used in normalized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mortgager => "mortgager",
            Self::Address => "address",
            Self::Date => "date",
            Self::AmountLoaned => "amountLoaned",
            Self::Valuation => "valuation",
            Self::RecordNumber => "recordNumber",
            Self::Dimensions => "dimensions",
            Self::Properties => "properties",
            Self::AdditionalInfo => "additionalInfo",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == key)
    }

    /// Field name as it appears in an export document.
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::Mortgager => "Mortgager",
            Self::Address => "Street Address",
            Self::Date => "Record Date",
            Self::AmountLoaned => "Amount Loaned",
            Self::Valuation => "Valuation",
            Self::RecordNumber => "Record Number",
            Self::Dimensions => "Land & Building Dimensions",
            Self::Properties => "Stories & Materials",
            Self::AdditionalInfo => "Additional Info",
        }
    }

    pub fn from_source_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.source_name() == name)
    }

    /// Transform a raw export value. Returns `None` when the result is empty.
    pub fn transform(&self, value: &Value) -> Option<FieldValue> {
        let transformed = match self {
            Self::Date => value
                .as_str()
                .map(|s| FieldValue::Text(Value::String(truncate_date(s).to_string())))?,
            Self::Dimensions => FieldValue::Dimensions(Dimensions {
                land: sub_field(value, "em_survey_land_dimensions"),
                building: sub_field(value, "em_survey_building_dimensions"),
            }),
            Self::Properties => FieldValue::Properties(Properties {
                stories: sub_field(value, "em_record_stories"),
                material: sub_field(value, "em_record_material"),
            }),
            _ => FieldValue::Text(value.clone()),
        };

        (!transformed.is_empty()).then_some(transformed)
    }

    /// Rebuild a previously transformed value from its serialized form.
    fn restore(&self, value: Value) -> Result<FieldValue, serde_json::Error> {
        match self {
            Self::Dimensions => serde_json::from_value(value).map(FieldValue::Dimensions),
            Self::Properties => serde_json::from_value(value).map(FieldValue::Properties),
            _ => Ok(FieldValue::Text(value)),
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep only the calendar-date portion of a timestamp.
pub fn truncate_date(value: &str) -> &str {
    value.split('T').next().unwrap_or(value)
}

fn sub_field(value: &Value, key: &str) -> Option<Value> {
    value
        .get(key)
        .filter(|v| !is_empty_value(v))
        .cloned()
}

/// JSON emptiness: `null`, `""`, `{}` and arrays holding only empty values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.iter().all(is_empty_value),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Land and building dimensions of a surveyed lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub land: Option<Value>,
    #[serde(default)]
    pub building: Option<Value>,
}

/// Number of stories and building material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub stories: Option<Value>,
    #[serde(default)]
    pub material: Option<Value>,
}

/// A transformed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Passed through unchanged (or truncated, for dates).
    Text(Value),
    Dimensions(Dimensions),
    Properties(Properties),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(Value::String(value.into()))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(v) => is_empty_value(v),
            FieldValue::Dimensions(d) => d.land.is_none() && d.building.is_none(),
            FieldValue::Properties(p) => p.stories.is_none() && p.material.is_none(),
        }
    }

    /// Whether the value would read back as several values if written bare.
    fn is_array(&self) -> bool {
        matches!(self, FieldValue::Text(Value::Array(_)))
    }

    /// Human-readable rendering used for display names and geocoder input.
    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Text(Value::String(s)) => s.clone(),
            FieldValue::Text(v) => v.to_string(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

/// Normalized fields of one record.
///
/// Every present key holds at least one non-empty value. Values for a key
/// that occurs several times in the export document are kept in the order
/// they were seen. A single value serializes bare, several as an array. A
/// single value that is itself an array is wrapped in one more array so it
/// reads back as one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFields {
    values: BTreeMap<CanonicalField, Vec<FieldValue>>,
}

impl NormalizedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `value` appended under `field`. Empty values are ignored.
    pub fn with(mut self, field: CanonicalField, value: FieldValue) -> Self {
        if !value.is_empty() {
            self.values.entry(field).or_default().push(value);
        }
        self
    }

    pub fn get(&self, field: CanonicalField) -> Option<&[FieldValue]> {
        self.values.get(&field).map(|v| v.as_slice())
    }

    pub fn first(&self, field: CanonicalField) -> Option<&FieldValue> {
        self.values.get(&field).and_then(|v| v.first())
    }

    /// First value of `field` rendered as text.
    pub fn first_text(&self, field: CanonicalField) -> Option<String> {
        self.first(field).map(FieldValue::display_text)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &[FieldValue])> {
        self.values.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Fields as a JSON object, for merging into document data.
    ///
    /// Unlike the store format, a lone array value is written as is.
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter_map(|(field, values)| {
                let value = match values.as_slice() {
                    [single] => serde_json::to_value(single),
                    many => serde_json::to_value(many),
                };
                value.ok().map(|v| (field.as_str().to_string(), v))
            })
            .collect()
    }
}

impl Serialize for NormalizedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, values) in &self.values {
            match values.as_slice() {
                [single] if !single.is_array() => map.serialize_entry(field.as_str(), single)?,
                all => map.serialize_entry(field.as_str(), all)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NormalizedFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = NormalizedFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of canonical field keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = NormalizedFields::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    let field = CanonicalField::from_key(&key)
                        .ok_or_else(|| de::Error::custom(format!("unknown field key '{}'", key)))?;
                    let raw = match value {
                        Value::Array(items) => items,
                        single => vec![single],
                    };
                    for item in raw {
                        let restored = field.restore(item).map_err(de::Error::custom)?;
                        fields = fields.with(field, restored);
                    }
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}
