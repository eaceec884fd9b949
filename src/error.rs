use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a whole directory scan. No partial listing is ever returned.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no target directory given")]
    BlankDirectory,

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to enumerate {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Failure to read metadata from a single module file.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a PE image")]
    NotPe,

    #[error("invalid PE image: {0}")]
    Pe(#[from] goblin::error::Error),

    #[error("RVA 0x{0:x} is outside the image")]
    BadRva(u32),

    #[error("malformed version resource: {0}")]
    VersionResource(&'static str),

    #[error("malformed CLI metadata: {0}")]
    Metadata(&'static str),
}
