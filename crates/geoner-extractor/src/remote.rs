//! Remote NER client
//!
//! Sends document text to an HTTP NER service (for example a spaCy model
//! behind a small web wrapper) and reads back labelled spans:
//!
//! ```text
//! POST {url}  {"text": "..."}
//! 200         {"ents": [{"start": 0, "end": 7, "label": "GPE"}]}
//! ```
//!
//! Offsets in the response are character offsets.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use geoner_core::{EntityLabel, EntityRecognizer, GeonerError, NerConfig, RecognizedEntity, Result};

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    #[serde(default)]
    ents: Vec<RemoteEntity>,
}

#[derive(Debug, Deserialize)]
struct RemoteEntity {
    start: usize,
    end: usize,
    label: String,
}

/// HTTP NER service client
pub struct RemoteNer {
    client: Client,
    url: String,
}

impl RemoteNer {
    /// Create a new client for the given endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &NerConfig) -> Result<Self> {
        let url = config
            .remote_url
            .as_ref()
            .ok_or_else(|| GeonerError::ConfigError("ner.remote_url required".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeonerError::ConfigError(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            url: url.clone(),
        })
    }
}

/// Parse a service response body into spans over `text`
///
/// Character offsets are converted to byte offsets. Spans that are empty
/// or fall outside the text are discarded.
pub fn parse_response(body: &str, text: &str) -> Result<Vec<RecognizedEntity>> {
    let response: NerResponse = serde_json::from_str(body)
        .map_err(|e| GeonerError::RecognitionError(format!("Failed to parse response: {e}")))?;

    // Byte offset of every char position, plus one past the end
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut entities: Vec<RecognizedEntity> = response
        .ents
        .into_iter()
        .filter_map(|e| {
            if e.start >= e.end {
                return None;
            }
            let start = *boundaries.get(e.start)?;
            let end = *boundaries.get(e.end)?;
            Some(RecognizedEntity::from_span(
                text,
                start,
                end,
                EntityLabel::parse(&e.label),
            ))
        })
        .collect();

    entities.sort_by_key(|e| e.start);
    Ok(entities)
}

#[async_trait]
impl EntityRecognizer for RemoteNer {
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
        let response = self
            .client
            .post(&self.url)
            .json(&NerRequest { text })
            .send()
            .await
            .map_err(|e| GeonerError::RecognitionError(format!("NER request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeonerError::RecognitionError(format!(
                "NER service returned {status}: {error_text}"
            )));
        }

        let body = response.text().await.map_err(|e| {
            GeonerError::RecognitionError(format!("Failed to read NER response: {e}"))
        })?;

        parse_response(&body, text)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_spans() {
        let text = "Baghdad Is A City.";
        let body = r#"{"ents": [
            {"start": 0, "end": 7, "label": "GPE"},
            {"start": 13, "end": 17, "label": "weapon"}
        ]}"#;

        let entities = parse_response(body, text).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].text, "Baghdad");
        assert_eq!(entities[0].label, EntityLabel::Gpe);
        assert_eq!(entities[1].text, "City");
        assert_eq!(entities[1].label, EntityLabel::Other("WEAPON".to_string()));
    }

    #[test]
    fn test_parse_response_converts_char_offsets() {
        let text = "Près de Zürich et Genève";
        let body = r#"{"ents": [{"start": 18, "end": 24, "label": "GPE"}, {"start": 8, "end": 14, "label": "GPE"}]}"#;

        let entities = parse_response(body, text).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(names, vec!["Zürich", "Genève"]);
    }

    #[test]
    fn test_parse_response_drops_invalid_spans() {
        let body = r#"{"ents": [{"start": 3, "end": 3, "label": "GPE"}, {"start": 2, "end": 99, "label": "GPE"}]}"#;
        assert!(parse_response(body, "Iraq").unwrap().is_empty());
        assert!(parse_response("{}", "Iraq").unwrap().is_empty());
        assert!(parse_response("not json", "Iraq").is_err());
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(RemoteNer::from_config(&NerConfig::default()).is_err());

        let config = NerConfig {
            remote_url: Some("http://localhost:8090/ent".to_string()),
            ..Default::default()
        };
        let ner = RemoteNer::from_config(&config).unwrap();
        assert_eq!(ner.name(), "remote");
    }
}
