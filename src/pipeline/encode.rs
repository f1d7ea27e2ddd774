//! Artifact encoding: single-page PDF → base64 `data:` URI.
//!
//! The OCR API accepts a document reference whose URL may be a data URI, so
//! the artifact travels inside the JSON request body and no separate upload
//! step is needed.

use crate::error::EncodingError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Transport form of one document artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    /// `data:application/pdf;base64,...`
    pub document_url: String,
}

impl DocumentPayload {
    /// Wrap raw PDF bytes.
    pub fn from_pdf_bytes(bytes: &[u8]) -> Self {
        Self {
            document_url: format!("data:application/pdf;base64,{}", STANDARD.encode(bytes)),
        }
    }
}

/// Read the artifact at `path` and encode it for transport.
pub fn encode_artifact(path: &Path) -> Result<DocumentPayload, EncodingError> {
    let bytes = std::fs::read(path).map_err(|source| EncodingError {
        path: path.to_path_buf(),
        source,
    })?;
    let payload = DocumentPayload::from_pdf_bytes(&bytes);
    debug!(
        "Encoded {} → {} bytes base64",
        path.display(),
        payload.document_url.len()
    );
    Ok(payload)
}
