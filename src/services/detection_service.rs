//! External AI field-name detection.
//!
//! Given one sample record, the collaborator guesses which top-level keys hold
//! quantity and price (e.g. `quantity_available`, `unit_price`, `stock`,
//! `cost`). It is strictly best-effort: the caller treats any error - missing
//! configuration, timeout, malformed response - as "no mapping detected" and
//! never fails the ingestion request over it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;

/// Per-request timeout for the detection call.
const DETECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Field names the detector identified. Either may be absent.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DetectedFields {
    pub quantity_field: Option<String>,
    pub price_field: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("detection is not configured")]
    NotConfigured,

    #[error("detection request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("detection returned an unusable response: {0}")]
    Response(String),
}

/// Client for a Gemini-style generateContent endpoint.
pub struct FieldDetector {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

impl FieldDetector {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.detection_api_key.clone(),
            model: config.detection_model.clone(),
            endpoint: config.detection_endpoint.clone(),
        }
    }

    /// Ask the model which fields of `sample` represent quantity and price.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no API key is set; `Request` on transport failures
    /// including the 10 second timeout; `Response` when the reply cannot be
    /// parsed. Callers fall back to a null mapping on every error.
    pub async fn detect(&self, sample: &Value) -> Result<DetectedFields, DetectError> {
        let api_key = self.api_key.as_deref().ok_or(DetectError::NotConfigured)?;

        let prompt = format!(
            "Identify which fields represent quantity and price in this retail data.\n\
             Data: {sample}\n\n\
             Return JSON with exactly this structure:\n\
             {{\n  \"quantity_field\": \"<field_name_or_null>\",\n  \"price_field\": \"<field_name_or_null>\"\n}}\n\n\
             Only return the JSON, no other text."
        );

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .timeout(DETECTION_TIMEOUT)
            .json(&GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
            })
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| DetectError::Response("no candidates returned".to_string()))?;

        parse_detection(text)
    }
}

/// Parse the model's reply, tolerating markdown code fences around the JSON.
fn parse_detection(text: &str) -> Result<DetectedFields, DetectError> {
    let mut trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        trimmed = rest;
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }

    serde_json::from_str(trimmed.trim()).map_err(|e| DetectError::Response(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let fields =
            parse_detection(r#"{"quantity_field": "stock", "price_field": "cost"}"#).unwrap();
        assert_eq!(fields.quantity_field.as_deref(), Some("stock"));
        assert_eq!(fields.price_field.as_deref(), Some("cost"));
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "```json\n{\"quantity_field\": \"qty_avail\", \"price_field\": null}\n```";
        let fields = parse_detection(reply).unwrap();
        assert_eq!(fields.quantity_field.as_deref(), Some("qty_avail"));
        assert_eq!(fields.price_field, None);
    }

    #[test]
    fn rejects_non_json_reply() {
        assert!(parse_detection("I could not determine the fields.").is_err());
    }
}
