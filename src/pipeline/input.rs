//! Input resolution: turn user-supplied paths into an ordered list of
//! [`SourceItem`]s.
//!
//! Files are taken in the order given. A directory expands to its supported
//! image files (non-recursive) sorted by file name, so re-running over the
//! same folder yields the same batch order.

use crate::error::PantheonError;
use crate::record::ItemKey;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions accepted as OCR input (lower-case, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "jp2"];

/// One image selected for OCR.
///
/// The pipeline only borrows the file; it never moves or modifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub key: ItemKey,
    pub path: PathBuf,
}

impl SourceItem {
    /// Build an item from a path with a supported extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if !is_supported(&path) {
            return None;
        }
        let key = ItemKey::from_path(&path)?;
        Some(Self { key, path })
    }

    /// File name used in status messages.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.to_string())
    }

    /// Lower-case extension.
    pub fn extension(&self) -> String {
        extension_of(&self.path).unwrap_or_default()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Expand files and directories into source items.
///
/// Unsupported files are skipped with a warning. A path that does not exist
/// is an error: the caller named it explicitly.
pub fn collect_items(inputs: &[PathBuf]) -> Result<Vec<SourceItem>, PantheonError> {
    let mut items = Vec::new();

    for input in inputs {
        if !input.exists() {
            return Err(PantheonError::InputNotFound { path: input.clone() });
        }

        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|e| PantheonError::Workspace {
                path: input.clone(),
                source: e,
            })?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported(p))
                .collect();
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            debug!("{}: {} supported images", input.display(), files.len());
            items.extend(files.into_iter().filter_map(SourceItem::from_path));
        } else if let Some(item) = SourceItem::from_path(input.clone()) {
            items.push(item);
        } else {
            warn!("Skipping unsupported file: {}", input.display());
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_case_insensitive() {
        assert!(is_supported(Path::new("a.PNG")));
        assert!(is_supported(Path::new("a.jpeg")));
        assert!(is_supported(Path::new("a.jp2")));
        assert!(!is_supported(Path::new("a.pdf")));
        assert!(!is_supported(Path::new("a.json")));
        assert!(!is_supported(Path::new("noext")));
    }

    #[test]
    fn item_key_and_name() {
        let item = SourceItem::from_path("/scans/Page_01.JPG").unwrap();
        assert_eq!(item.key.as_str(), "Page_01");
        assert_eq!(item.name(), "Page_01.JPG");
        assert_eq!(item.extension(), "jpg");
    }

    #[test]
    fn missing_input_is_an_error() {
        let err = collect_items(&[PathBuf::from("/definitely/not/here.png")]).unwrap_err();
        assert!(matches!(err, PantheonError::InputNotFound { .. }));
    }

    #[test]
    fn directory_expands_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "notes.txt", "b.gif", "record.json"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let items = collect_items(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = items.iter().map(SourceItem::name).collect();
        assert_eq!(names, vec!["a.jpg", "b.gif", "c.png"]);
    }

    #[test]
    fn explicit_files_keep_caller_order() {
        let dir = tempfile::tempdir().unwrap();
        let z = dir.path().join("z.png");
        let a = dir.path().join("a.png");
        let txt = dir.path().join("readme.txt");
        for p in [&z, &a, &txt] {
            std::fs::write(p, b"x").unwrap();
        }
        let items = collect_items(&[z.clone(), txt, a.clone()]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, z);
        assert_eq!(items[1].path, a);
    }
}
