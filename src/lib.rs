pub mod binary;
pub mod bytes;
pub mod cli;
pub mod clr;
pub mod error;
pub mod lister;
pub mod output;
pub mod pe;
pub mod scanner;
pub mod version_info;

pub use binary::{MetadataReader, PeMetadataReader, VersionRecord};
pub use error::{ReadError, ScanError};
pub use lister::{ModuleLister, ScanEntry, ScanReport};
pub use scanner::{DirectoryScanner, FileSystemScanner};
