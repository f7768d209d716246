//! ArcGIS World Geocoder client
//!
//! Issues one `findAddressCandidates` lookup per address and keeps the
//! first candidate.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use geoner_core::{GeoPoint, Geocoder, GeocoderConfig, GeonerError, Result};
use reqwest::Client;
use serde::Deserialize;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Candidate {
    address: Option<String>,
    location: Location,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Location {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: i64,
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

/// Extract the first candidate from a `findAddressCandidates` JSON body
///
/// An empty candidate list is `Ok(None)`. Malformed JSON and service
/// error objects (which ArcGIS returns with HTTP 200) are errors.
pub fn parse_candidates(body: &str) -> Result<Option<GeoPoint>> {
    let response: CandidatesResponse = serde_json::from_str(body)
        .map_err(|e| GeonerError::GeocodeError(format!("Failed to parse response: {e}")))?;

    if let Some(err) = response.error {
        return Err(GeonerError::GeocodeError(format!(
            "Service error {}: {} {}",
            err.code,
            err.message,
            err.details.join("; ")
        )));
    }

    Ok(response
        .candidates
        .first()
        .map(|c| GeoPoint::new(c.location.x, c.location.y)))
}

// ============================================================================
// ArcGIS Client
// ============================================================================

/// ArcGIS `findAddressCandidates` client
pub struct ArcGisGeocoder {
    client: Client,
    url: String,
    token: Option<String>,
}

impl ArcGisGeocoder {
    /// Create a new client for the given endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            token: None,
        }
    }

    /// Create from config
    pub fn from_config(config: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeonerError::ConfigError(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    /// Set an access token sent with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl Geocoder for ArcGisGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        tracing::info!("Geocoding {}", address);

        let mut query = vec![("f", "json"), ("singleLine", address)];
        if let Some(token) = &self.token {
            query.push(("token", token.as_str()));
        }

        let response = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| GeonerError::GeocodeError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeonerError::GeocodeError(format!(
                "Geocoder returned {status}: {error_text}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeonerError::GeocodeError(format!("Failed to read response: {e}")))?;

        let location = parse_candidates(&body)?;
        match location {
            Some(point) => tracing::info!("Geocoded results: {}", point),
            None => tracing::warn!("No candidates for {}", address),
        }

        Ok(location)
    }

    fn name(&self) -> &str {
        "arcgis"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned JSON response and hand back the raw request
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}/findAddressCandidates"), handle)
    }

    #[test]
    fn test_parse_first_candidate() {
        let body = r#"{
            "spatialReference": {"wkid": 4326, "latestWkid": 4326},
            "candidates": [
                {"address": "Baghdad, Iraq", "location": {"x": 44.4, "y": 33.3}, "score": 100},
                {"address": "Baghdad, FL", "location": {"x": -86.9, "y": 30.6}, "score": 90}
            ]
        }"#;

        let point = parse_candidates(body).unwrap().unwrap();
        assert_eq!(point, GeoPoint::new(44.4, 33.3));
    }

    #[test]
    fn test_parse_no_candidates() {
        let body = r#"{"spatialReference": {"wkid": 4326}, "candidates": []}"#;
        assert_eq!(parse_candidates(body).unwrap(), None);
    }

    #[test]
    fn test_parse_service_error() {
        let body = r#"{"error": {"code": 498, "message": "Invalid Token", "details": []}}"#;
        let err = parse_candidates(body).unwrap_err();
        assert!(err.to_string().contains("Invalid Token"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_candidates("<html>").is_err());
    }

    #[tokio::test]
    async fn test_geocode_sends_single_line_query() {
        let (url, server) =
            serve_once(r#"{"candidates": [{"location": {"x": 47.98, "y": 29.37}}]}"#).await;

        let geocoder = ArcGisGeocoder::new(url);
        let point = geocoder.geocode("Kuwait City").await.unwrap();
        assert_eq!(point, Some(GeoPoint::new(47.98, 29.37)));

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /findAddressCandidates?"));
        assert!(request_line.contains("f=json"));
        assert!(request_line.contains("singleLine=Kuwait+City"));
        assert!(!request_line.contains("token="));
    }

    #[tokio::test]
    async fn test_geocode_empty_candidates_is_none() {
        let (url, server) = serve_once(r#"{"candidates": []}"#).await;

        let geocoder = ArcGisGeocoder::new(url).with_token("abc");
        assert_eq!(geocoder.geocode("Atlantis").await.unwrap(), None);

        let request = server.await.unwrap();
        assert!(request.lines().next().unwrap().contains("token=abc"));
    }

    #[tokio::test]
    async fn test_geocode_unreachable_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let geocoder = ArcGisGeocoder::new(format!("http://{addr}/findAddressCandidates"));
        assert!(matches!(
            geocoder.geocode("Basra").await,
            Err(GeonerError::GeocodeError(_))
        ));
    }
}
