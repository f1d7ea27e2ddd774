//! OCR service client: submit one document, get one structured result.
//!
//! [`OcrService`] is the seam the batch orchestrator talks to;
//! [`MistralOcrClient`] is the production implementation. Tests plug in their
//! own service.
//!
//! The service's JSON response enters the crate's data model in exactly one
//! place, [`to_record`]. Anything that does not fit the record shape is
//! reported as a [`SerializationError`] so the caller can decide what to
//! persist instead.
//!
//! No retries happen here: one failed submission is final for that item.

use crate::config::PipelineConfig;
use crate::error::{PantheonError, SerializationError, ServiceError};
use crate::pipeline::encode::DocumentPayload;
use crate::record::{EmbeddedImage, OcrRecord, Page};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// A document-OCR backend.
#[async_trait::async_trait]
pub trait OcrService: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Submit one document and return the service's raw JSON response.
    async fn submit(&self, payload: &DocumentPayload) -> Result<Value, ServiceError>;
}

/// Mistral OCR over HTTPS.
pub struct MistralOcrClient {
    api_key: String,
    endpoint: String,
    model: String,
    include_image_base64: bool,
    client: reqwest::Client,
}

impl std::fmt::Debug for MistralOcrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralOcrClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("include_image_base64", &self.include_image_base64)
            .finish_non_exhaustive()
    }
}

impl MistralOcrClient {
    /// Build a client reading the API key from `config.api_key_env`.
    ///
    /// A missing or empty key yields [`PantheonError::OcrUnavailable`]; callers
    /// can keep running with OCR disabled.
    pub fn from_env(config: &PipelineConfig) -> Result<Self, PantheonError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PantheonError::OcrUnavailable {
                hint: format!("{} not set. OCR disabled.", config.api_key_env),
            })?;
        Self::new(api_key, config)
    }

    /// Build a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, config: &PipelineConfig) -> Result<Self, PantheonError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| PantheonError::OcrUnavailable {
                hint: format!("HTTP client: {e}"),
            })?;
        Ok(Self {
            api_key: api_key.into(),
            endpoint: config.ocr_endpoint(),
            model: config.model.clone(),
            include_image_base64: config.include_image_base64,
            client,
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: DocumentSource<'a>,
    include_image_base64: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DocumentSource<'a> {
    DocumentUrl { document_url: &'a str },
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<OcrResponsePage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OcrResponsePage {
    markdown: String,
    #[serde(default)]
    images: Vec<OcrResponseImage>,
}

#[derive(Deserialize)]
struct OcrResponseImage {
    id: String,
    #[serde(default)]
    image_base64: Option<String>,
}

#[async_trait::async_trait]
impl OcrService for MistralOcrClient {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn submit(&self, payload: &DocumentPayload) -> Result<Value, ServiceError> {
        let body = OcrRequest {
            model: &self.model,
            document: DocumentSource::DocumentUrl {
                document_url: &payload.document_url,
            },
            include_image_base64: self.include_image_base64,
        };

        info!("MistralOcrClient: calling OCR API ({})", self.model);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), text));
        }

        debug!(
            "MistralOcrClient: raw response ({} bytes): {}",
            text.len(),
            text.chars().take(300).collect::<String>()
        );
        serde_json::from_str(&text).map_err(|e| ServiceError::MalformedResponse(e.to_string()))
    }
}

/// Map a non-success HTTP status to a [`ServiceError`].
pub fn classify_status(status: u16, body: String) -> ServiceError {
    match status {
        401 | 403 => ServiceError::Unauthorized { status, body },
        429 => ServiceError::QuotaExceeded { body },
        _ => ServiceError::Http { status, body },
    }
}

/// Map a raw OCR response onto the persisted record shape.
///
/// Pages keep service order. Images the service returned without inline data
/// are left out, since there is nothing to extract for them.
pub fn to_record(response: Value) -> Result<OcrRecord, SerializationError> {
    let parsed: OcrResponse = serde_json::from_value(response).map_err(|e| SerializationError {
        detail: e.to_string(),
    })?;

    let pages = parsed
        .pages
        .into_iter()
        .map(|page| Page {
            markdown: page.markdown,
            images: page
                .images
                .into_iter()
                .filter_map(|img| {
                    img.image_base64.map(|data| EmbeddedImage {
                        id: img.id,
                        image_base64: data,
                    })
                })
                .collect(),
        })
        .collect();

    Ok(OcrRecord {
        pages,
        model: parsed.model,
        error: None,
        details: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let body = OcrRequest {
            model: "mistral-ocr-latest",
            document: DocumentSource::DocumentUrl {
                document_url: "data:application/pdf;base64,AAAA",
            },
            include_image_base64: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "model": "mistral-ocr-latest",
                "document": { "type": "document_url", "document_url": "data:application/pdf;base64,AAAA" },
                "include_image_base64": true
            })
        );
    }

    #[test]
    fn response_maps_to_record() {
        let response = json!({
            "pages": [
                { "index": 0, "markdown": "# Title\n![img-0.jpeg](img-0.jpeg)",
                  "images": [ { "id": "img-0.jpeg", "top_left_x": 1, "image_base64": "data:image/jpeg;base64,AAAA" },
                              { "id": "img-1.jpeg" } ],
                  "dimensions": { "dpi": 200, "height": 100, "width": 100 } },
                { "index": 1, "markdown": "" }
            ],
            "model": "mistral-ocr-2505",
            "usage_info": { "pages_processed": 2 }
        });
        let record = to_record(response).expect("maps");
        assert_eq!(record.pages.len(), 2);
        assert_eq!(record.pages[0].images.len(), 1);
        assert_eq!(record.pages[0].images[0].id, "img-0.jpeg");
        assert!(record.pages[1].images.is_empty());
        assert_eq!(record.model.as_deref(), Some("mistral-ocr-2505"));
        assert!(!record.is_error_marker());
    }

    #[test]
    fn wrong_shape_is_a_serialization_error() {
        assert!(to_record(json!({ "object": "error", "message": "nope" })).is_err());
        assert!(to_record(json!([1, 2, 3])).is_err());
        assert!(to_record(json!({ "pages": [ { "markdown": 5 } ] })).is_err());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(classify_status(401, String::new()), ServiceError::Unauthorized { .. }));
        assert!(matches!(classify_status(403, String::new()), ServiceError::Unauthorized { .. }));
        assert!(matches!(classify_status(429, String::new()), ServiceError::QuotaExceeded { .. }));
        assert!(matches!(
            classify_status(500, "boom".into()),
            ServiceError::Http { status: 500, .. }
        ));
    }

    #[test]
    fn missing_key_disables_client() {
        let config = PipelineConfig::builder()
            .api_key_env("PANTHEON_TEST_KEY_THAT_IS_NEVER_SET")
            .build()
            .unwrap();
        let err = MistralOcrClient::from_env(&config).unwrap_err();
        assert!(matches!(err, PantheonError::OcrUnavailable { .. }));
        assert!(err.to_string().contains("PANTHEON_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn explicit_key_builds_client() {
        let client = MistralOcrClient::new("sk-test", &PipelineConfig::default()).unwrap();
        assert_eq!(client.name(), "mistral_ocr");
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("sk-test"), "API key must not leak into Debug");
    }
}
