//! Configuration types for the OCR batch and stitch workflows.
//!
//! * [`PipelineConfig`] — how the OCR service is reached, built via
//!   [`PipelineConfigBuilder`].
//! * [`WorkspaceLayout`] — where records, the stitched document, extracted
//!   images, and the final rendered artifact live under one base folder.
//! * [`CompileConfig`] — how the external document compiler is invoked.

use crate::error::PantheonError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default OCR model identifier.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Default OCR API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Environment variable holding the OCR API key.
pub const DEFAULT_API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Configuration for the OCR service client.
///
/// # Example
/// ```rust
/// use pantheon_ocr::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("mistral-ocr-latest")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_timeout_secs, 90);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub model: String,

    /// Base URL of the OCR API; `/ocr` is appended. Default: Mistral's public API.
    pub api_base_url: String,

    /// Environment variable the API key is read from. Default: `MISTRAL_API_KEY`.
    pub api_key_env: String,

    /// Timeout for one HTTP request in seconds. Default: 120.
    ///
    /// Applies to a single submission only; a batch as a whole has no deadline.
    pub api_timeout_secs: u64,

    /// Ask the service to return embedded images inline as base64. Default: true.
    pub include_image_base64: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_timeout_secs: 120,
            include_image_base64: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the OCR endpoint.
    pub fn ocr_endpoint(&self) -> String {
        format!("{}/ocr", self.api_base_url.trim_end_matches('/'))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PantheonError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(PantheonError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(PantheonError::InvalidConfig(format!(
                "api_base_url must be an HTTP/HTTPS URL, got '{}'",
                c.api_base_url
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(PantheonError::InvalidConfig("api_timeout_secs must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

/// Folder conventions under one base folder.
///
/// ```text
/// <base>/
///   json/                          one record per OCR'd image
///   markdown/stitched_document.md  merged document
///   images/                        extracted assets
///   final_output/final_document.pdf
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    base: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The same layout rooted at an absolute base.
    ///
    /// Paths handed to a child process running inside the base must not be
    /// relative to the caller's working directory.
    pub fn absolute(&self) -> std::io::Result<Self> {
        Ok(Self {
            base: std::path::absolute(&self.base)?,
        })
    }

    pub fn records_dir(&self) -> PathBuf {
        self.base.join("json")
    }

    pub fn markdown_dir(&self) -> PathBuf {
        self.base.join("markdown")
    }

    pub fn stitched_document(&self) -> PathBuf {
        self.markdown_dir().join("stitched_document.md")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base.join("images")
    }

    pub fn final_output_dir(&self) -> PathBuf {
        self.base.join("final_output")
    }

    pub fn final_document(&self) -> PathBuf {
        self.final_output_dir().join("final_document.pdf")
    }
}

/// How to run the external document compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Compiler executable. Default: `pandoc`.
    pub program: String,

    /// PDF engine passed as `--pdf-engine`. Default: `tectonic`. `None` omits the flag.
    pub pdf_engine: Option<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            pdf_engine: Some("tectonic".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.model, "mistral-ocr-latest");
        assert_eq!(c.api_key_env, "MISTRAL_API_KEY");
        assert!(c.include_image_base64);
        assert_eq!(c.ocr_endpoint(), "https://api.mistral.ai/v1/ocr");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let c = PipelineConfig::builder()
            .api_base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(c.ocr_endpoint(), "http://localhost:8080/v1/ocr");
    }

    #[test]
    fn builder_rejects_empty_model() {
        assert!(matches!(
            PipelineConfig::builder().model("  ").build(),
            Err(PantheonError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(PipelineConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn builder_rejects_non_http_url() {
        assert!(PipelineConfig::builder().api_base_url("ftp://x").build().is_err());
    }

    #[test]
    fn layout_paths() {
        let l = WorkspaceLayout::new("/work");
        assert_eq!(l.records_dir(), PathBuf::from("/work/json"));
        assert_eq!(l.stitched_document(), PathBuf::from("/work/markdown/stitched_document.md"));
        assert_eq!(l.images_dir(), PathBuf::from("/work/images"));
        assert_eq!(l.final_document(), PathBuf::from("/work/final_output/final_document.pdf"));
    }

    #[test]
    fn absolute_layout_keeps_relative_suffix() {
        let l = WorkspaceLayout::new("scans").absolute().unwrap();
        assert!(l.base().is_absolute());
        assert!(l.base().ends_with("scans"));
        assert!(l.stitched_document().ends_with("scans/markdown/stitched_document.md"));

        let abs = WorkspaceLayout::new("/work");
        assert_eq!(abs.absolute().unwrap(), abs);
    }
}
