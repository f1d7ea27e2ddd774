//! OCR record data model and its lenient JSON reader.
//!
//! One [`OcrRecord`] is persisted per source item as pretty-printed JSON:
//!
//! ```json
//! {
//!   "pages": [
//!     { "markdown": "See ![img-0.jpeg](img-0.jpeg)",
//!       "images": [ { "id": "img-0.jpeg", "image_base64": "data:image/jpeg;base64,..." } ] }
//!   ]
//! }
//! ```
//!
//! Records are written strictly (serde) but read leniently: files on disk may
//! be hand-edited or come from older runs, and one bad page or image entry must
//! not cost the whole record.

use crate::error::StitchIssue;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Extension used when a payload carries no usable image subtype.
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpeg";

/// Stable identity of a source item, derived from its file stem.
///
/// Keys order records for stitching, so `Ord` is plain byte-wise string order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for an image path: `scans/page_01.png` → `page_01`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the persisted record for this key.
    pub fn record_file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable OCR result for one source item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrRecord {
    /// Pages in service order.
    #[serde(default)]
    pub pages: Vec<Page>,

    /// Model that produced the record, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Set only on error-marker records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable detail accompanying `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// One OCR page: Markdown plus the images it references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<EmbeddedImage>,
}

/// An image returned inline by the OCR service.
///
/// `id` is the placeholder used inside the page Markdown; `image_base64` is
/// either raw base64 or a `data:<mime>;base64,` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub id: String,
    pub image_base64: String,
}

impl OcrRecord {
    /// Record written in place of an OCR result that could not be mapped.
    pub fn error_marker(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            pages: Vec::new(),
            model: None,
            error: Some(error.into()),
            details: Some(details.into()),
        }
    }

    pub fn is_error_marker(&self) -> bool {
        self.error.is_some()
    }

    /// Parse a persisted record, tolerating damage below the top level.
    ///
    /// Fails only when the text is not JSON or the top level is not an object.
    /// Non-object pages become empty pages; image entries without a string `id`
    /// and `image_base64` are dropped with a warning.
    pub fn parse_lenient(text: &str, source: &str) -> Result<Self, StitchIssue> {
        let value: Value = serde_json::from_str(text).map_err(|e| StitchIssue::Parse {
            record: source.to_string(),
            detail: format!("invalid JSON: {e}"),
        })?;

        let Value::Object(obj) = value else {
            return Err(StitchIssue::Parse {
                record: source.to_string(),
                detail: format!("top-level JSON is {}, expected an object", json_kind(&value)),
            });
        };

        let pages = match obj.get("pages") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(idx, page)| parse_page(page, source, idx))
                .collect(),
            Some(other) => {
                warn!("{source}: 'pages' is {}, ignoring", json_kind(other));
                Vec::new()
            }
        };

        Ok(Self {
            pages,
            model: string_field(&obj, "model"),
            error: string_field(&obj, "error"),
            details: string_field(&obj, "details"),
        })
    }
}

fn parse_page(value: &Value, source: &str, page_idx: usize) -> Page {
    let Value::Object(page) = value else {
        warn!("{source}: page {page_idx} is {}, treating as empty", json_kind(value));
        return Page::default();
    };

    let markdown = page
        .get("markdown")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let images = match page.get("images") {
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .filter_map(|(img_idx, entry)| {
                let image = parse_image(entry);
                if image.is_none() {
                    warn!("{source}: page {page_idx} image {img_idx} is malformed, skipping");
                }
                image
            })
            .collect(),
        _ => Vec::new(),
    };

    Page { markdown, images }
}

fn parse_image(value: &Value) -> Option<EmbeddedImage> {
    let id = value.get("id")?.as_str()?;
    let payload = value.get("image_base64")?.as_str()?;
    if id.is_empty() || payload.is_empty() {
        return None;
    }
    Some(EmbeddedImage {
        id: id.to_string(),
        image_base64: payload.to_string(),
    })
}

fn string_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    obj.get(name).and_then(Value::as_str).map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl EmbeddedImage {
    /// File extension for the decoded image.
    ///
    /// Taken from a `data:image/<subtype>;base64,` prefix when the subtype is
    /// alphanumeric, [`DEFAULT_IMAGE_EXTENSION`] otherwise.
    pub fn inferred_extension(&self) -> &str {
        split_payload(&self.image_base64).0
    }

    /// Decode the payload to raw image bytes.
    ///
    /// Non-zero trailing bits in the last symbol are accepted.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let (_, data) = split_payload(&self.image_base64);
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        LENIENT.decode(compact)
    }
}

/// Standard alphabet and padding, tolerant of non-canonical trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Split a payload into `(extension, base64 data)`.
fn split_payload(payload: &str) -> (&str, &str) {
    let Some((header, data)) = payload.split_once(',') else {
        return (DEFAULT_IMAGE_EXTENSION, payload);
    };

    let extension = header
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split(';').next())
        .and_then(|mime| mime.rsplit('/').next())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_IMAGE_EXTENSION);

    (extension, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(payload: &str) -> EmbeddedImage {
        EmbeddedImage {
            id: "img-0.jpeg".into(),
            image_base64: payload.into(),
        }
    }

    #[test]
    fn key_from_path_uses_stem() {
        let key = ItemKey::from_path(Path::new("scans/page_01.png")).unwrap();
        assert_eq!(key.as_str(), "page_01");
        assert_eq!(key.record_file_name(), "page_01.json");
    }

    #[test]
    fn keys_sort_bytewise() {
        let mut keys = vec![ItemKey::new("b"), ItemKey::new("B"), ItemKey::new("a10"), ItemKey::new("a2")];
        keys.sort();
        let sorted: Vec<&str> = keys.iter().map(ItemKey::as_str).collect();
        assert_eq!(sorted, vec!["B", "a10", "a2", "b"]);
    }

    #[test]
    fn extension_from_data_uri() {
        assert_eq!(image("data:image/png;base64,AAAA").inferred_extension(), "png");
        assert_eq!(image("data:image/jpeg;base64,AAAA").inferred_extension(), "jpeg");
    }

    #[test]
    fn extension_defaults_for_raw_and_odd_subtypes() {
        assert_eq!(image("iVBORw0KGgo=").inferred_extension(), "jpeg");
        assert_eq!(image("data:image/svg+xml;base64,AAAA").inferred_extension(), "jpeg");
        assert_eq!(image("data:application/pdf;base64,AAAA").inferred_extension(), "jpeg");
        assert_eq!(image("data:image/;base64,AAAA").inferred_extension(), "jpeg");
    }

    #[test]
    fn decode_raw_and_prefixed() {
        assert_eq!(image("aGVsbG8=").decode().unwrap(), b"hello");
        assert_eq!(image("data:image/png;base64,aGVsbG8=").decode().unwrap(), b"hello");
        assert_eq!(image("data:image/png;base64,aGVs\nbG8=").decode().unwrap(), b"hello");
    }

    #[test]
    fn decode_accepts_non_canonical_trailing_bits() {
        // "aGk=" is canonical; "aGl=" carries a stray low bit.
        assert_eq!(image("data:image/png;base64,aGl=").decode().unwrap(), b"hi");
        assert_eq!(image("aGVsbG9=").decode().unwrap(), b"hello");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(image("data:image/png;base64,@@not base64@@").decode().is_err());
    }

    #[test]
    fn parse_rejects_top_level_array() {
        let err = OcrRecord::parse_lenient(r#"[{"pages": []}]"#, "a.json").unwrap_err();
        assert!(err.to_string().contains("an array"), "got: {err}");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(matches!(
            OcrRecord::parse_lenient("{not json", "a.json"),
            Err(StitchIssue::Parse { .. })
        ));
    }

    #[test]
    fn parse_drops_malformed_images_only() {
        let text = r#"{
            "pages": [
                { "markdown": "A ![](x)", "images": [
                    { "id": "x", "image_base64": "aGk=" },
                    { "id": "y" },
                    { "image_base64": "aGk=" },
                    42
                ]},
                "not a page",
                { "images": [] }
            ]
        }"#;
        let record = OcrRecord::parse_lenient(text, "a.json").unwrap();
        assert_eq!(record.pages.len(), 3);
        assert_eq!(record.pages[0].images.len(), 1);
        assert_eq!(record.pages[0].images[0].id, "x");
        assert!(record.pages[1].markdown.is_empty());
        assert!(record.pages[2].markdown.is_empty());
    }

    #[test]
    fn error_marker_round_trips_through_lenient_reader() {
        let marker = OcrRecord::error_marker("Failed to serialize OCR response", "missing field `pages`");
        let text = serde_json::to_string_pretty(&marker).unwrap();
        let back = OcrRecord::parse_lenient(&text, "m.json").unwrap();
        assert!(back.is_error_marker());
        assert!(back.pages.is_empty());
        assert_eq!(back.details.as_deref(), Some("missing field `pages`"));
    }
}
