use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;

pub const MODULE_EXTENSION: &str = "dll";

/// Enumerates candidate module files under a directory.
pub trait FileSystemScanner {
    fn scan(&self, directory: &Path, recursive: bool) -> Result<Vec<PathBuf>, ScanError>;
}

/// Empty, or nothing but whitespace once decoded.
pub(crate) fn is_blank_path(path: &Path) -> bool {
    path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty()
}

/// Walks the real file system, matching files by extension.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    extension: String,
}

impl DirectoryScanner {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(MODULE_EXTENSION)
    }
}

/// Files before subdirectories, then by name.
fn walk_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

impl FileSystemScanner for DirectoryScanner {
    fn scan(&self, directory: &Path, recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
        if is_blank_path(directory) {
            return Err(ScanError::BlankDirectory);
        }

        let root = directory.to_path_buf();
        let metadata = fs::metadata(&root).map_err(|source| ScanError::Io {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }

        let mut walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by(walk_order);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut modules = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| ScanError::Walk {
                path: root.clone(),
                source,
            })?;
            let path = entry.path();

            if path.is_file() && self.matches(path) {
                modules.push(entry.into_path());
            }
        }

        Ok(modules)
    }
}
