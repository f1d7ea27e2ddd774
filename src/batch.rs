//! Batch OCR: run every source item through normalize → encode → OCR → store.
//!
//! Items are processed one after another in input order. A failure at any
//! stage ends that item only; the batch always reaches the end and reports
//! 100 %. Each item's PDF artifact lives in its own temporary directory that
//! is removed when the item finishes, whichever way it finishes.
//!
//! ```text
//! item i:  normalize ─▶ encode ─▶ submit ─▶ persist
//!            25 %        50 %      75 %      100 %   of item i's share
//! ```

use crate::error::{ItemError, PantheonError};
use crate::pipeline::encode::encode_artifact;
use crate::pipeline::input::SourceItem;
use crate::pipeline::normalize::normalize_file;
use crate::pipeline::ocr::{to_record, OcrService};
use crate::pipeline::store::ResultStore;
use crate::progress::{BatchProgress, ProgressReporter, Stage, WorkflowHandle};
use crate::record::{ItemKey, OcrRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Error tag stored in the record when the OCR result cannot be serialised.
pub const SERIALIZATION_FAILED: &str = "Serialization failed";

/// Final status line of a batch.
pub const BATCH_COMPLETE: &str = "OCR processing complete for selected files.";

/// How one item ended.
#[derive(Debug, Clone, Serialize)]
pub enum ItemStatus {
    /// A full OCR record was persisted.
    Succeeded { record_path: PathBuf },
    /// The OCR result could not be serialised; an error-marker record was
    /// persisted in its place.
    Degraded { record_path: PathBuf, detail: String },
    /// No record was persisted.
    Failed(ItemError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub key: ItemKey,
    /// Source file name, for messages.
    pub name: String,
    pub status: ItemStatus,
}

impl ItemOutcome {
    /// Path of the persisted record, if any.
    pub fn record_path(&self) -> Option<&PathBuf> {
        match &self.status {
            ItemStatus::Succeeded { record_path } | ItemStatus::Degraded { record_path, .. } => {
                Some(record_path)
            }
            ItemStatus::Failed(_) => None,
        }
    }
}

/// Result of a whole batch, outcomes in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchSummary {
    fn push(&mut self, outcome: ItemOutcome) {
        match outcome.status {
            ItemStatus::Succeeded { .. } => self.succeeded += 1,
            ItemStatus::Degraded { .. } => self.degraded += 1,
            ItemStatus::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Records written, full or error-marker.
    pub fn records_written(&self) -> usize {
        self.succeeded + self.degraded
    }
}

/// Knobs for a batch run that do not change its results.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Where per-item artifact directories are created. Defaults to the
    /// system temp directory.
    pub artifact_root: Option<PathBuf>,
}

/// Run the batch on the current task with default [`BatchOptions`].
///
/// Fails before touching any item when `items` is empty or the store
/// directory cannot be created.
pub async fn run_batch(
    items: &[SourceItem],
    service: &dyn OcrService,
    store: &ResultStore,
    reporter: &ProgressReporter,
) -> Result<BatchSummary, PantheonError> {
    run_batch_with(items, service, store, reporter, &BatchOptions::default()).await
}

/// [`run_batch`] with explicit options.
pub async fn run_batch_with(
    items: &[SourceItem],
    service: &dyn OcrService,
    store: &ResultStore,
    reporter: &ProgressReporter,
    options: &BatchOptions,
) -> Result<BatchSummary, PantheonError> {
    if items.is_empty() {
        return Err(PantheonError::NoItems);
    }
    store.ensure_dir().await?;

    let total = items.len();
    info!(
        "Starting OCR batch: {} items via {} → {}",
        total,
        service.name(),
        store.dir().display()
    );

    let mut progress = BatchProgress::new(total);
    let mut summary = BatchSummary {
        total,
        ..Default::default()
    };

    for (index, item) in items.iter().enumerate() {
        let name = item.name();
        reporter.status(format!("Processing file {}/{}: {}...", index + 1, total, name));

        let mut ctx = ItemContext {
            index,
            name: &name,
            artifact_root: options.artifact_root.as_deref(),
            reporter,
            progress: &mut progress,
        };
        let status = process_item(item, service, store, &mut ctx).await;

        if let ItemStatus::Failed(ref e) = status {
            warn!("{e}");
        }
        reporter.progress(progress.item_done(index), format!("Finished {name}"));
        summary.push(ItemOutcome {
            key: item.key.clone(),
            name,
            status,
        });
    }

    reporter.progress(progress.finish(), BATCH_COMPLETE);
    reporter.status(format!(
        "{} succeeded, {} degraded, {} failed",
        summary.succeeded, summary.degraded, summary.failed
    ));
    info!(
        "OCR batch finished: {}/{} records written ({} degraded, {} failed)",
        summary.records_written(),
        total,
        summary.degraded,
        summary.failed
    );
    Ok(summary)
}

/// Run the batch on a background task.
///
/// Returns at once; progress arrives on the handle's event channel.
pub fn spawn_batch(
    items: Vec<SourceItem>,
    service: Arc<dyn OcrService>,
    store: ResultStore,
) -> WorkflowHandle<BatchSummary> {
    WorkflowHandle::spawn(move |reporter| async move {
        run_batch(&items, service.as_ref(), &store, &reporter).await
    })
}

struct ItemContext<'a> {
    index: usize,
    name: &'a str,
    artifact_root: Option<&'a Path>,
    reporter: &'a ProgressReporter,
    progress: &'a mut BatchProgress,
}

impl ItemContext<'_> {
    fn stage_done(&mut self, stage: Stage) {
        let pct = self.progress.after_stage(self.index, stage);
        self.reporter
            .progress(pct, format!("{} {}", stage.label(), self.name));
    }

    fn failed(&self, headline: &str) {
        self.reporter.warning(format!("{headline}: {}", self.name));
    }
}

async fn process_item(
    item: &SourceItem,
    service: &dyn OcrService,
    store: &ResultStore,
    ctx: &mut ItemContext<'_>,
) -> ItemStatus {
    let item_name = ctx.name.to_string();
    let conversion_failed = |detail: String| {
        ItemStatus::Failed(ItemError::Conversion {
            item: item_name.clone(),
            detail,
        })
    };

    // ── Normalize ──────────────────────────────────────────────────────────
    // Dropped at the end of this function, removing the artifact.
    let mut builder = tempfile::Builder::new();
    builder.prefix("pantheon-");
    let workdir = match ctx.artifact_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    let workdir = match workdir {
        Ok(dir) => dir,
        Err(e) => {
            ctx.failed("Failed PDF conversion");
            return conversion_failed(format!("temporary directory: {e}"));
        }
    };
    let artifact = workdir.path().join(format!("{}.pdf", item.key));

    let src = item.path.clone();
    let dst = artifact.clone();
    let converted = tokio::task::spawn_blocking(move || normalize_file(&src, &dst))
        .await
        .map_err(|e| format!("conversion task failed: {e}"))
        .and_then(|r| r.map_err(|e| e.to_string()));
    if let Err(detail) = converted {
        ctx.failed("Failed PDF conversion");
        return conversion_failed(detail);
    }
    ctx.stage_done(Stage::Normalize);

    // ── Encode ─────────────────────────────────────────────────────────────
    let payload = match encode_artifact(&artifact) {
        Ok(p) => p,
        Err(e) => {
            ctx.failed("Failed PDF encoding");
            return ItemStatus::Failed(ItemError::Encoding {
                item: item_name,
                detail: e.to_string(),
            });
        }
    };
    ctx.stage_done(Stage::Encode);

    // ── Submit ─────────────────────────────────────────────────────────────
    let response = match service.submit(&payload).await {
        Ok(r) => r,
        Err(e) => {
            ctx.failed("Failed OCR request");
            return ItemStatus::Failed(ItemError::Service {
                item: item_name,
                detail: e.to_string(),
            });
        }
    };
    ctx.stage_done(Stage::Submit);

    // ── Persist ────────────────────────────────────────────────────────────
    let (record, degraded) = match to_record(response) {
        Ok(record) => (record, None),
        Err(e) => {
            warn!("{item_name}: {e}");
            ctx.reporter
                .warning(format!("OCR result for {item_name} could not be serialised; saving error record"));
            (
                OcrRecord::error_marker(SERIALIZATION_FAILED, e.detail.clone()),
                Some(e.detail),
            )
        }
    };

    let record_path = match store.write(&item.key, &record).await {
        Ok(path) => path,
        Err(e) => {
            ctx.failed("Failed save JSON");
            return ItemStatus::Failed(ItemError::Persist {
                item: item_name,
                detail: e.to_string(),
            });
        }
    };
    ctx.stage_done(Stage::Persist);

    match degraded {
        None => ItemStatus::Succeeded { record_path },
        Some(detail) => ItemStatus::Degraded {
            record_path,
            detail,
        },
    }
}
