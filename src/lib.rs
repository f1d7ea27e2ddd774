//! # pantheon-ocr
//!
//! Batch-OCR scanned images with Mistral OCR, then stitch the results into a
//! single Markdown document with extracted images and hand it to pandoc.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images
//!  │
//!  ├─ 1. Input      expand files/folders into supported images
//!  ├─ 2. Normalize  image → single-page PDF (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode     PDF → base64 data URI
//!  ├─ 4. OCR        one HTTPS call per image
//!  └─ 5. Store      <workspace>/json/<stem>.json
//!
//! records
//!  │
//!  ├─ 6. Stitch     markdown/stitched_document.md + images/image_NNNNNNNNNN.<ext>
//!  └─ 7. Compile    pandoc → final_output/final_document.pdf
//! ```
//!
//! Steps 1–5 are [`batch::run_batch`]; steps 6–7 are [`assemble::assemble`].
//! Both report through a [`ProgressReporter`] and have `spawn_*` variants that
//! run on a background task.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pantheon_ocr::{
//!     collect_items, run_batch, MistralOcrClient, PipelineConfig, ProgressReporter,
//!     ResultStore, WorkspaceLayout,
//! };
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let client = MistralOcrClient::from_env(&config)?; // reads MISTRAL_API_KEY
//!
//!     let layout = WorkspaceLayout::new("scans");
//!     let items = collect_items(&[PathBuf::from("scans")])?;
//!     let store = ResultStore::new(layout.records_dir());
//!
//!     let summary = run_batch(&items, &client, &store, &ProgressReporter::disabled()).await?;
//!     eprintln!("{} of {} records written", summary.records_written(), summary.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pantheon` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{assemble, spawn_assemble, AssembleOutput};
pub use batch::{
    run_batch, run_batch_with, spawn_batch, BatchOptions, BatchSummary, ItemOutcome, ItemStatus,
};
pub use config::{CompileConfig, PipelineConfig, PipelineConfigBuilder, WorkspaceLayout};
pub use error::{ItemError, PantheonError, StitchIssue};
pub use pipeline::input::{collect_items, SourceItem};
pub use pipeline::ocr::{MistralOcrClient, OcrService};
pub use pipeline::stitch::StitchReport;
pub use pipeline::store::ResultStore;
pub use progress::{ProgressEvent, ProgressReporter, WorkflowHandle};
pub use record::{EmbeddedImage, ItemKey, OcrRecord, Page};
