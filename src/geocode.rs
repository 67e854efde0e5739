//! Geocoder capability and its HTTP implementation.
//!
//! The pipeline treats a geocoder as a black box: a free-text address goes
//! in, a [`GeocodeMatch`] or a [`GeocodeError`] comes out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::{GeocodeError, PipelineError};
use crate::models::GeocodeMatch;

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeocodeMatch, GeocodeError>;
}

/// Geocoder reached over HTTP.
///
/// Issues `GET <endpoint>?q=<address>` and accepts either a single GeoJSON
/// feature or a feature collection, in which case the first feature wins.
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    client: Client,
    endpoint: Url,
}

impl HttpGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            PipelineError::Config(format!("invalid geocoder URL '{}': {}", endpoint, e))
        })?;
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, endpoint })
    }

    fn request_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("q", address);
        url
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodeMatch, GeocodeError> {
        let url = self.request_url(address);
        tracing::debug!("Geocoding '{}' via {}", address, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GeocodeError::Decode(e.to_string()))?;

        parse_response(address, body)
    }
}

/// Pick the match out of a geocoder response body.
pub fn parse_response(address: &str, body: Value) -> Result<GeocodeMatch, GeocodeError> {
    let feature = match body {
        Value::Object(mut obj) if obj.contains_key("features") => {
            match obj.remove("features") {
                Some(Value::Array(features)) => features
                    .into_iter()
                    .next()
                    .ok_or_else(|| GeocodeError::NotFound(address.to_string()))?,
                _ => return Err(GeocodeError::Decode("'features' is not an array".to_string())),
            }
        }
        Value::Array(features) => features
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(address.to_string()))?,
        other => other,
    };

    serde_json::from_value(feature).map_err(|e| GeocodeError::Decode(e.to_string()))
}
