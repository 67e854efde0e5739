//! Geocoding results attached to enriched records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A successful geocoder match.
///
/// Only `properties.address.id` and `geometry` are interpreted; the rest of
/// the geocoder's response is carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub properties: MatchProperties,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProperties {
    pub address: AddressRef,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRef {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeocodeMatch {
    pub fn new(address_id: impl Into<String>, geometry: Option<Value>) -> Self {
        Self {
            properties: MatchProperties {
                address: AddressRef {
                    id: address_id.into(),
                    extra: Map::new(),
                },
                extra: Map::new(),
            },
            geometry,
            extra: Map::new(),
        }
    }

    /// Canonical identifier of the matched address.
    pub fn address_id(&self) -> &str {
        &self.properties.address.id
    }
}

/// Outcome of geocoding one record's address.
///
/// Absence of an outcome (no address to geocode) is modelled as
/// `Option<GeocodeOutcome>::None` by the enclosing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeRepr", into = "OutcomeRepr")]
pub enum GeocodeOutcome {
    Found(GeocodeMatch),
    NotFound { error: String },
}

impl GeocodeOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, GeocodeOutcome::Found(_))
    }

    pub fn matched(&self) -> Option<&GeocodeMatch> {
        match self {
            GeocodeOutcome::Found(m) => Some(m),
            GeocodeOutcome::NotFound { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GeocodeOutcome::Found(_) => None,
            GeocodeOutcome::NotFound { error } => Some(error),
        }
    }
}

/// Wire form: `{"found": true, "result": ...}` or `{"found": false, "error": ...}`.
#[derive(Serialize, Deserialize)]
struct OutcomeRepr {
    found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<GeocodeMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<GeocodeOutcome> for OutcomeRepr {
    fn from(outcome: GeocodeOutcome) -> Self {
        match outcome {
            GeocodeOutcome::Found(result) => OutcomeRepr {
                found: true,
                result: Some(result),
                error: None,
            },
            GeocodeOutcome::NotFound { error } => OutcomeRepr {
                found: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeRepr> for GeocodeOutcome {
    type Error = String;

    fn try_from(repr: OutcomeRepr) -> Result<Self, Self::Error> {
        match (repr.found, repr.result, repr.error) {
            (true, Some(result), _) => Ok(GeocodeOutcome::Found(result)),
            (true, None, _) => Err("geocode outcome marked found without a result".to_string()),
            (false, _, error) => Ok(GeocodeOutcome::NotFound {
                error: error.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_found_wire_format() {
        let outcome = GeocodeOutcome::Found(GeocodeMatch::new(
            "A1",
            Some(json!({"type": "Point", "coordinates": [-74.0, 40.7]})),
        ));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["found"], json!(true));
        assert_eq!(value["result"]["properties"]["address"]["id"], json!("A1"));
        assert!(value.get("error").is_none());

        let back: GeocodeOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_not_found_wire_format() {
        let outcome = GeocodeOutcome::NotFound {
            error: "No match found for address: 1 Nowhere".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"found": false, "error": "No match found for address: 1 Nowhere"})
        );
        assert_eq!(outcome.error(), Some("No match found for address: 1 Nowhere"));
        assert!(outcome.matched().is_none());
    }

    #[test]
    fn test_found_without_result_is_rejected() {
        let result: Result<GeocodeOutcome, _> = serde_json::from_value(json!({"found": true}));
        assert!(result.is_err());
    }

    #[test]
    fn test_match_keeps_extra_properties() {
        let raw = json!({
            "type": "Feature",
            "properties": {"address": {"id": "A7", "name": "12 Main St"}, "score": 0.9},
            "geometry": {"type": "Point", "coordinates": [0, 0]}
        });
        let m: GeocodeMatch = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(m.address_id(), "A7");
        assert_eq!(serde_json::to_value(&m).unwrap(), raw);
    }
}
