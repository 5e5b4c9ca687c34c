use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const GEOAPIFY_API_BASE: &str = "https://api.geoapify.com/v1/geocode";

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geocoding is not configured (GEOAPIFY_API_KEY missing)")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("Geoapify returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for GeoError {
    fn from(err: reqwest::Error) -> Self {
        GeoError::Http(err.without_url())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoPlace {
    pub formatted: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoapifyResponse {
    #[serde(default)]
    results: Vec<GeoapifyResult>,
}

#[derive(Debug, Deserialize)]
struct GeoapifyResult {
    #[serde(default)]
    formatted: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    result_type: Option<String>,
}

impl GeoapifyResult {
    fn into_place(self) -> Option<GeoPlace> {
        Some(GeoPlace {
            formatted: self.formatted.unwrap_or_default(),
            lat: self.lat?,
            lon: self.lon?,
            city: self.city,
            state: self.state,
            country: self.country,
            result_type: self.result_type,
        })
    }
}

/// Geoapify forward geocoding and autocomplete, restricted to India.
pub struct GeocodingService {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeocodingService {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, GeoError> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("GEOAPIFY_API_KEY not set; geocoding endpoints will return 503");
        }
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: GEOAPIFY_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn search(&self, text: &str) -> Result<Vec<GeoPlace>, GeoError> {
        self.request("search", text, None).await
    }

    pub async fn autocomplete(&self, text: &str, limit: u32) -> Result<Vec<GeoPlace>, GeoError> {
        self.request("autocomplete", text, Some(limit.clamp(1, 20))).await
    }

    async fn request(
        &self,
        endpoint: &str,
        text: &str,
        limit: Option<u32>,
    ) -> Result<Vec<GeoPlace>, GeoError> {
        let key = self.api_key.as_deref().ok_or(GeoError::MissingApiKey)?;

        let mut query = vec![
            ("text", text.to_string()),
            ("format", "json".to_string()),
            ("countrycodes", "in".to_string()),
            ("apiKey", key.to_string()),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let resp = self.client.get(url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeoError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeoapifyResponse = resp.json().await?;
        let places: Vec<GeoPlace> = parsed
            .results
            .into_iter()
            .filter_map(GeoapifyResult::into_place)
            .collect();
        tracing::debug!("Geoapify {} '{}' -> {} results", endpoint, text, places.len());
        Ok(places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_key() {
        let geo = GeocodingService::new(None, Duration::from_secs(5)).unwrap();
        assert!(matches!(geo.search("Delhi").await, Err(GeoError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_autocomplete_request_and_mapping() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/autocomplete")
                .query_param("text", "Koram")
                .query_param("countrycodes", "in")
                .query_param("limit", "5")
                .query_param("apiKey", "geo-key");
            then.status(200).json_body(json!({
                "results": [
                    { "formatted": "Koramangala, Bengaluru", "lat": 12.93, "lon": 77.62,
                      "city": "Bengaluru", "state": "Karnataka", "country": "India",
                      "result_type": "suburb" },
                    { "formatted": "no coordinates" }
                ]
            }));
        });

        let geo = GeocodingService::new(Some("geo-key".into()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.base_url());
        let places = geo.autocomplete("Koram", 5).await.unwrap();

        mock.assert();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].state.as_deref(), Some("Karnataka"));
        assert_eq!(places[0].result_type.as_deref(), Some("suburb"));
    }

    #[tokio::test]
    async fn test_upstream_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(401).body("invalid apiKey");
        });
        let geo = GeocodingService::new(Some("bad".into()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.base_url());
        let err = geo.search("Delhi").await.unwrap_err();
        assert!(matches!(err, GeoError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_omits_key() {
        let geo = GeocodingService::new(Some("geo-secret-4291".into()), Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let err = geo.search("Delhi").await.unwrap_err();
        assert!(matches!(err, GeoError::Http(_)));
        assert!(!err.to_string().contains("geo-secret-4291"));
        assert!(!crate::error::AppError::from(err).to_string().contains("geo-secret-4291"));
    }
}
