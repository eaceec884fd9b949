use std::fs;
use std::path::Path;

use crate::error::ReadError;
use crate::pe::PeAnalyzer;

/// One row of the report: a module's logical name and its two version strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub name: String,
    pub file_version: String,
    pub product_version: String,
}

impl VersionRecord {
    pub fn new(
        name: impl Into<String>,
        file_version: impl Into<String>,
        product_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_version: file_version.into(),
            product_version: product_version.into(),
        }
    }
}

/// Reads the version record of a single module file.
pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<VersionRecord, ReadError>;
}

/// Reads PE images straight from disk. The module is never loaded or executed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeMetadataReader;

impl MetadataReader for PeMetadataReader {
    fn read(&self, path: &Path) -> Result<VersionRecord, ReadError> {
        scan_module(path)
    }
}

pub fn scan_module(path: &Path) -> Result<VersionRecord, ReadError> {
    let io_err = |source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::open(path).map_err(io_err)?;
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(io_err)?;

    if !is_pe_image(&mmap) {
        return Err(ReadError::NotPe);
    }

    let analyzer = PeAnalyzer::new(path, &mmap)?;
    analyzer.analyze()
}

fn is_pe_image(data: &[u8]) -> bool {
    // DOS header is 64 bytes, e_lfanew sits at 0x3c
    data.len() >= 0x40 && &data[0..2] == b"MZ"
}
