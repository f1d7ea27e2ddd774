//! Error types for the pantheon-ocr library.
//!
//! Failures fall into two families:
//!
//! * [`PantheonError`] — **Fatal**: an operation cannot begin at all (no
//!   items, no records, OCR client not configured, compiler missing). Returned
//!   as `Err(PantheonError)` from the top-level entry points.
//!
//! * Per-unit errors — **Non-fatal**: one item, one record, or one embedded
//!   image failed. [`ItemError`] lives inside
//!   [`crate::batch::ItemOutcome`] and [`StitchIssue`] inside
//!   [`crate::pipeline::stitch::StitchReport`]. The surrounding batch or
//!   stitch pass always continues.

use std::path::PathBuf;
use thiserror::Error;

/// Maximum characters of compiler diagnostics shown to a human.
pub const DIAGNOSTIC_DISPLAY_CHARS: usize = 200;

/// All fatal errors returned by the pantheon-ocr library.
#[derive(Debug, Error)]
pub enum PantheonError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The batch was started with nothing to process.
    #[error("No suitable image files selected for OCR")]
    NoItems,

    /// An explicitly named input does not exist.
    #[error("Input not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// The records directory is missing or holds no `.json` records.
    #[error("No .json records found in '{dir}'\nRun OCR first.")]
    NoRecords { dir: PathBuf },

    // ── OCR client errors ─────────────────────────────────────────────────
    /// The OCR service client could not be constructed.
    #[error("OCR client is not configured: {hint}")]
    OcrUnavailable { hint: String },

    // ── Compilation errors ────────────────────────────────────────────────
    /// The external document compiler is not installed or not on `PATH`.
    #[error("Document compiler '{program}' not found. Install it and ensure it is on PATH.")]
    CompilerNotFound { program: String },

    /// The external document compiler exited with a non-zero status.
    #[error("{program} failed (code {code:?}): {diagnostic}")]
    CompilationFailed {
        program: String,
        code: Option<i32>,
        diagnostic: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A workspace directory or output file could not be created/written.
    #[error("Failed to prepare '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a background task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PantheonError {
    /// Compiler diagnostics cut down for a status line or dialog.
    ///
    /// Returns `None` for every variant other than
    /// [`PantheonError::CompilationFailed`].
    pub fn display_diagnostic(&self) -> Option<String> {
        match self {
            PantheonError::CompilationFailed { diagnostic, .. } => {
                Some(truncate_for_display(diagnostic, DIAGNOSTIC_DISPLAY_CHARS))
            }
            _ => None,
        }
    }
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// An image could not be turned into a single-page document artifact.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The file type has no decoder in this build.
    #[error("unsupported image format '{0}'")]
    UnsupportedFormat(String),

    /// The bytes are corrupt or do not match the declared format.
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The PDF object graph could not be encoded.
    #[error("cannot build PDF: {0}")]
    Pdf(String),

    /// Reading the source or writing the artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A document artifact could not be read for transport.
#[derive(Debug, Error)]
#[error("cannot read artifact '{path}': {source}")]
pub struct EncodingError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failure while talking to the OCR service.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// 401/403 from the service.
    #[error("authentication rejected ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// 429 from the service.
    #[error("quota or rate limit exceeded: {body}")]
    QuotaExceeded { body: String },

    /// Any other non-success HTTP status.
    #[error("service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS, or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// The body was not JSON at all.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// The OCR result could not be mapped onto the persisted record shape.
#[derive(Debug, Clone, Error)]
#[error("OCR response does not match the record shape: {detail}")]
pub struct SerializationError {
    pub detail: String,
}

/// A non-fatal error for a single source item.
///
/// The item gets no record; the batch moves on to the next item.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// Corrupt or unsupported image.
    #[error("{item}: conversion failed: {detail}")]
    Conversion { item: String, detail: String },

    /// The converted artifact could not be read back for transport.
    #[error("{item}: encoding failed: {detail}")]
    Encoding { item: String, detail: String },

    /// The OCR service call did not complete successfully.
    #[error("{item}: OCR request failed: {detail}")]
    Service { item: String, detail: String },

    /// The record could not be written to the store.
    #[error("{item}: saving record failed: {detail}")]
    Persist { item: String, detail: String },
}

/// A non-fatal problem met while stitching.
///
/// The smallest affected unit (one record, one image) is skipped.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StitchIssue {
    /// A record file is not valid JSON or not a JSON object.
    #[error("{record}: skipped record: {detail}")]
    Parse { record: String, detail: String },

    /// An embedded image payload failed to decode.
    #[error("{record}: image '{image_id}' could not be decoded: {detail}")]
    ImageDecode {
        record: String,
        image_id: String,
        detail: String,
    },

    /// A decoded image could not be written to the asset directory.
    #[error("{record}: image '{image_id}' could not be written: {detail}")]
    ImageWrite {
        record: String,
        image_id: String,
        detail: String,
    },
}
