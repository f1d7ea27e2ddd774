//! Stitch-and-compile workflow over a [`WorkspaceLayout`].
//!
//! Progress checkpoints:
//!
//! | % | Step |
//! |---|------|
//! | 5 | collecting records |
//! | 20 | records read, stitching |
//! | 70 | stitched, compiling |
//! | 100 | done |
//!
//! Any fatal error sets progress back to 0 before it is returned.

use crate::config::{CompileConfig, WorkspaceLayout};
use crate::error::PantheonError;
use crate::pipeline::compile::{compile, CompileJob};
use crate::pipeline::stitch::{stitch, StitchReport};
use crate::pipeline::store::ResultStore;
use crate::progress::{ProgressReporter, WorkflowHandle};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

/// What an assemble run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AssembleOutput {
    pub stitch: StitchReport,
    /// The merged Markdown document.
    pub document: PathBuf,
    /// The compiled artifact; `None` when compilation was not requested.
    pub compiled: Option<PathBuf>,
}

/// Stitch every record in `layout` and, when `compiler` is given, compile
/// the result.
pub async fn assemble(
    layout: &WorkspaceLayout,
    compiler: Option<&CompileConfig>,
    reporter: &ProgressReporter,
) -> Result<AssembleOutput, PantheonError> {
    reporter.progress(5, "Collecting JSON files...");

    // The compiler runs inside the base, so every path it gets is absolute.
    let layout = layout.absolute().map_err(|source| {
        fail(
            reporter,
            PantheonError::Workspace {
                path: layout.base().to_path_buf(),
                source,
            },
        )
    })?;

    let store = ResultStore::new(layout.records_dir());
    let set = store.read_all().map_err(|e| fail(reporter, e))?;
    info!(
        "Assembling {} records from {}",
        set.records.len(),
        store.dir().display()
    );
    reporter.progress(
        20,
        format!(
            "Found {} records. Stitching...",
            set.records.len() + set.skipped.len()
        ),
    );

    let images_dir = layout.images_dir();
    let document = layout.stitched_document();
    let report = {
        let task_reporter = reporter.clone();
        let images_dir = images_dir.clone();
        let document = document.clone();
        tokio::task::spawn_blocking(move || stitch(&set, &images_dir, &document, &task_reporter))
            .await
            .map_err(|e| PantheonError::Internal(format!("stitch task failed: {e}")))
            .and_then(|r| r)
            .map_err(|e| fail(reporter, e))?
    };

    let Some(compiler) = compiler else {
        reporter.progress(100, format!("Stitched markdown: {}", document.display()));
        return Ok(AssembleOutput {
            stitch: report,
            document,
            compiled: None,
        });
    };

    reporter.progress(70, "Stitching complete. Converting to PDF...");
    let output = layout.final_document();
    let job = CompileJob {
        base: layout.base(),
        document: &document,
        resource_dir: &images_dir,
        output: &output,
    };
    compile(compiler, &job).await.map_err(|e| fail(reporter, e))?;

    reporter.progress(100, format!("PDF created: {}", output.display()));
    Ok(AssembleOutput {
        stitch: report,
        document,
        compiled: Some(output),
    })
}

/// Run [`assemble`] on a background task.
pub fn spawn_assemble(
    layout: WorkspaceLayout,
    compiler: Option<CompileConfig>,
) -> WorkflowHandle<AssembleOutput> {
    WorkflowHandle::spawn(move |reporter| async move {
        assemble(&layout, compiler.as_ref(), &reporter).await
    })
}

fn fail(reporter: &ProgressReporter, e: PantheonError) -> PantheonError {
    error!("{e}");
    let shown = e.display_diagnostic().unwrap_or_else(|| e.to_string());
    reporter.progress(0, format!("Failed: {shown}"));
    e
}
