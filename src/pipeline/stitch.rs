//! Document stitching: many OCR records → one Markdown file plus a flat
//! directory of extracted images.
//!
//! Records are consumed in the order given (the store sorts them by key) and
//! pages in stored order. Every embedded image that decodes is written as
//! `image_<10-digit counter>.<ext>`; the counter belongs to one
//! [`StitchRun`], starts at 0, and only advances when a file was actually
//! written, so identical inputs always produce identical names.
//!
//! Placeholders are rewritten in both forms the OCR service emits,
//! `![](id)` and `![id](id)`, to `![](<path relative to the document>)`.
//! Paths always use `/` so the document renders the same on every platform.

use crate::error::{PantheonError, StitchIssue};
use crate::pipeline::store::{RecordSet, StoredRecord};
use crate::progress::ProgressReporter;
use crate::record::{EmbeddedImage, Page};
use serde::Serialize;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Separator written after every non-empty page.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// File name of the `counter`-th extracted asset.
pub fn asset_file_name(counter: u64, extension: &str) -> String {
    format!("image_{counter:010}.{extension}")
}

/// Naming state for one stitch invocation.
#[derive(Debug, Default)]
pub struct StitchRun {
    next_asset: u64,
}

impl StitchRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the next asset would get. Does not consume the number.
    fn peek_name(&self, extension: &str) -> String {
        asset_file_name(self.next_asset, extension)
    }

    fn commit(&mut self) {
        self.next_asset += 1;
    }

    /// Number of assets written so far.
    pub fn assets_written(&self) -> u64 {
        self.next_asset
    }
}

/// Outcome of one stitch pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StitchReport {
    /// Records that were parsed and merged.
    pub records_merged: usize,
    /// Pages that contributed text.
    pub pages_written: usize,
    /// Image files written to the asset directory.
    pub assets_written: u64,
    /// Path of the merged document.
    pub document: PathBuf,
    /// Everything that was skipped, in encounter order.
    pub issues: Vec<StitchIssue>,
}

impl StitchReport {
    pub fn records_skipped(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, StitchIssue::Parse { .. }))
            .count()
    }

    pub fn images_skipped(&self) -> usize {
        self.issues.len() - self.records_skipped()
    }
}

/// Stitch `set` into `document`, extracting images into `images_dir`.
///
/// Both directories are created if missing. Record- and image-level failures
/// are logged, reported through `reporter`, and collected in the report; only
/// failing to create the output locations or to write the document itself is
/// fatal.
pub fn stitch(
    set: &RecordSet,
    images_dir: &Path,
    document: &Path,
    reporter: &ProgressReporter,
) -> Result<StitchReport, PantheonError> {
    let doc_dir = document
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    for dir in [images_dir, doc_dir] {
        std::fs::create_dir_all(dir).map_err(|source| PantheonError::Workspace {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let asset_prefix = asset_link_prefix(doc_dir, images_dir)?;
    debug!("Asset links use prefix '{asset_prefix}'");

    let mut run = StitchRun::new();
    let mut report = StitchReport {
        document: document.to_path_buf(),
        issues: set.skipped.clone(),
        ..Default::default()
    };
    let mut output = String::new();

    let total = set.records.len();
    for (i, stored) in set.records.iter().enumerate() {
        reporter.status(format!("Stitching {} ({}/{})...", stored.source, i + 1, total));

        for page in &stored.record.pages {
            if let Some(text) =
                stitch_page(stored, page, images_dir, &asset_prefix, &mut run, &mut report, reporter)
            {
                output.push_str(&text);
                output.push_str(PAGE_SEPARATOR);
                report.pages_written += 1;
            }
        }
        report.records_merged += 1;
    }
    report.assets_written = run.assets_written();

    // The temp file is deleted on drop, so a failed write leaves nothing behind.
    tempfile::NamedTempFile::new_in(doc_dir)
        .and_then(|mut tmp| {
            tmp.write_all(output.as_bytes())?;
            tmp.persist(document).map_err(|e| e.error)?;
            Ok(())
        })
        .map_err(|source| PantheonError::Workspace {
            path: document.to_path_buf(),
            source,
        })?;

    info!(
        "Stitched {} records ({} pages, {} images) into {}",
        report.records_merged,
        report.pages_written,
        report.assets_written,
        document.display()
    );
    reporter.status(format!("Stitched markdown: {}", document.display()));
    Ok(report)
}

/// Rewrite one page. Returns `None` for pages without text.
fn stitch_page(
    stored: &StoredRecord,
    page: &Page,
    images_dir: &Path,
    asset_prefix: &str,
    run: &mut StitchRun,
    report: &mut StitchReport,
    reporter: &ProgressReporter,
) -> Option<String> {
    if page.markdown.is_empty() {
        return None;
    }

    let mut markdown = page.markdown.clone();
    for image in &page.images {
        match extract_image(image, images_dir, run) {
            Ok(file_name) => {
                let link = format!("{asset_prefix}{file_name}");
                markdown = replace_placeholder(&markdown, &image.id, &link);
            }
            Err(issue) => {
                let issue = issue.into_issue(&stored.source, &image.id);
                warn!("{issue}");
                reporter.warning(issue.to_string());
                report.issues.push(issue);
            }
        }
    }
    Some(markdown)
}

enum ImageFailure {
    Decode(String),
    Write(String),
}

impl ImageFailure {
    fn into_issue(self, record: &str, image_id: &str) -> StitchIssue {
        match self {
            ImageFailure::Decode(detail) => StitchIssue::ImageDecode {
                record: record.to_string(),
                image_id: image_id.to_string(),
                detail,
            },
            ImageFailure::Write(detail) => StitchIssue::ImageWrite {
                record: record.to_string(),
                image_id: image_id.to_string(),
                detail,
            },
        }
    }
}

/// Decode and write one image, returning its file name.
fn extract_image(
    image: &EmbeddedImage,
    images_dir: &Path,
    run: &mut StitchRun,
) -> Result<String, ImageFailure> {
    let bytes = image
        .decode()
        .map_err(|e| ImageFailure::Decode(e.to_string()))?;

    let file_name = run.peek_name(image.inferred_extension());
    std::fs::write(images_dir.join(&file_name), &bytes)
        .map_err(|e| ImageFailure::Write(e.to_string()))?;
    run.commit();

    debug!("Extracted {} → {} ({} bytes)", image.id, file_name, bytes.len());
    Ok(file_name)
}

/// Replace both placeholder forms of `id` with an image link to `link`.
pub fn replace_placeholder(markdown: &str, id: &str, link: &str) -> String {
    let target = format!("![]({link})");
    markdown
        .replace(&format!("![]({id})"), &target)
        .replace(&format!("![{id}]({id})"), &target)
}

/// `images_dir` relative to `doc_dir`, `/`-separated, with a trailing `/`
/// (empty when both are the same directory).
fn asset_link_prefix(doc_dir: &Path, images_dir: &Path) -> Result<String, PantheonError> {
    let canon = |p: &Path| {
        std::fs::canonicalize(p).map_err(|source| PantheonError::Workspace {
            path: p.to_path_buf(),
            source,
        })
    };
    let rel = relative_path(&canon(doc_dir)?, &canon(images_dir)?);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    })
}

/// Path of `to` as seen from directory `from`; both must be absolute.
///
/// Falls back to `to` itself when the two share no root (different drives).
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    if common == 0 {
        return to.iter().collect();
    }

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for c in &to[common..] {
        rel.push(c.as_os_str());
    }
    rel
}
