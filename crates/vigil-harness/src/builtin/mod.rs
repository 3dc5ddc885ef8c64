//! Built-in phase bodies that validate a source tree.

pub mod compatibility;
pub mod integration;
pub mod performance;
pub mod regression;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use vigil_core::ValidationConfig;

use crate::assessor::source::{self, Dialect};
use crate::assessor::ComponentAssessor;
use crate::phase::Phase;

/// Extensions treated as source files.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "c", "h", "cc", "cpp", "hpp", "go", "java", "js", "ts",
];

const SKIPPED_DIRS: &[&str] = &["target", ".git", "node_modules", "__pycache__", ".venv"];

/// All five built-in phases for `config`.
pub fn builtin_phases(config: &ValidationConfig) -> Vec<Arc<dyn Phase>> {
    vec![
        Arc::new(integration::suite()),
        Arc::new(regression::suite()),
        Arc::new(performance::suite()),
        Arc::new(ComponentAssessor::from_config(config)),
        Arc::new(compatibility::suite()),
    ]
}

/// Aggregate figures over a source tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub files_scanned: usize,
    pub functions_found: usize,
    pub bytes_scanned: u64,
}

fn is_skipped(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    SKIPPED_DIRS.contains(&name.as_ref())
        || exclude.is_some_and(|ex| {
            entry
                .path()
                .canonicalize()
                .is_ok_and(|p| p == ex)
        })
}

/// Source files under `root`, skipping build and VCS directories and `exclude`.
pub fn source_files(root: &Path, exclude: &Path) -> Vec<PathBuf> {
    let exclude = exclude.canonicalize().ok();
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e, exclude.as_deref()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
        })
        .collect()
}

/// Count files and declared functions under `root`.
pub fn scan_sources(root: &Path, exclude: &Path) -> anyhow::Result<SourceStats> {
    if !root.is_dir() {
        anyhow::bail!("target path {} is not a directory", root.display());
    }

    let mut stats = SourceStats::default();
    for path in source_files(root, exclude) {
        let Ok(src) = std::fs::read_to_string(&path) else {
            continue;
        };
        stats.files_scanned += 1;
        stats.bytes_scanned += src.len() as u64;
        stats.functions_found += source::function_names(&src, Dialect::from_path(&path)).len();
    }
    Ok(stats)
}
