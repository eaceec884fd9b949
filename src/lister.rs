use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::binary::{MetadataReader, VersionRecord};
use crate::error::{ReadError, ScanError};
use crate::scanner::FileSystemScanner;

/// Outcome for one enumerated file.
#[derive(Debug)]
pub enum ScanEntry {
    Included(VersionRecord),
    Skipped { path: PathBuf, error: ReadError },
}

/// Every enumerated file, in enumeration order.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn records(&self) -> impl Iterator<Item = &VersionRecord> {
        self.entries.iter().filter_map(|entry| match entry {
            ScanEntry::Included(record) => Some(record),
            ScanEntry::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&Path, &ReadError)> {
        self.entries.iter().filter_map(|entry| match entry {
            ScanEntry::Skipped { path, error } => Some((path.as_path(), error)),
            ScanEntry::Included(_) => None,
        })
    }

    pub fn into_records(self) -> Vec<VersionRecord> {
        self.entries
            .into_iter()
            .filter_map(|entry| match entry {
                ScanEntry::Included(record) => Some(record),
                ScanEntry::Skipped { .. } => None,
            })
            .collect()
    }
}

pub struct ModuleLister<S, R> {
    scanner: S,
    reader: R,
}

impl<S: FileSystemScanner, R: MetadataReader> ModuleLister<S, R> {
    pub fn new(scanner: S, reader: R) -> Self {
        Self { scanner, reader }
    }

    /// Enumerate and read every module. A failed scan fails the whole listing;
    /// a module that cannot be read is recorded as skipped.
    pub fn list(&self, directory: &Path, recursive: bool) -> Result<ScanReport, ScanError> {
        let paths = self.scanner.scan(directory, recursive)?;
        debug!(
            directory = %directory.display(),
            recursive,
            candidates = paths.len(),
            "enumerated modules"
        );

        let entries = paths
            .into_iter()
            .map(|path| match self.reader.read(&path) {
                Ok(record) => ScanEntry::Included(record),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping module");
                    ScanEntry::Skipped { path, error }
                }
            })
            .collect();

        Ok(ScanReport { entries })
    }
}
