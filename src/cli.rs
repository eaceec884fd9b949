use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::binary::PeMetadataReader;
use crate::lister::ModuleLister;
use crate::output::write_report;
use crate::scanner::DirectoryScanner;

#[derive(Parser, Debug, Default)]
#[command(
    name = "dllversions",
    about = "Lists the name, file version and product version of every DLL in a directory",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Args {
    /// Directory to scan for modules
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<OsString>,

    /// "true" to descend into subdirectories
    #[arg(value_name = "RECURSIVE")]
    pub recursive: Option<OsString>,

    /// File the report is written to
    #[arg(value_name = "CSV_DESTINATION")]
    pub csv_destination: Option<OsString>,

    #[arg(hide = true, num_args = 0..)]
    pub ignored: Vec<OsString>,
}

impl Args {
    /// Map raw command-line tokens (program name excluded) onto the positionals.
    ///
    /// Every token is a value: a leading escape keeps clap from reading `--` or
    /// `-x` as option syntax, so tokens never shift position.
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv = [OsString::from("dllversions"), OsString::from("--")]
            .into_iter()
            .chain(tokens.into_iter().map(Into::into));
        Self::try_parse_from(argv).unwrap_or_default()
    }
}

/// Resolved run settings. Missing values fall back to empty paths and a flat scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub target_directory: PathBuf,
    pub recursive: bool,
    pub output_path: PathBuf,
}

impl From<Args> for Configuration {
    fn from(args: Args) -> Self {
        Self {
            target_directory: args.directory.map(PathBuf::from).unwrap_or_default(),
            recursive: args
                .recursive
                .as_deref()
                .and_then(OsStr::to_str)
                .and_then(parse_bool_literal)
                .unwrap_or(false),
            output_path: args.csv_destination.map(PathBuf::from).unwrap_or_default(),
        }
    }
}

/// `true`/`false` in any letter case, surrounding whitespace ignored.
pub fn parse_bool_literal(token: &str) -> Option<bool> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("true") {
        Some(true)
    } else if token.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn run(args: Args) -> Result<()> {
    let config = Configuration::from(args);
    let lister = ModuleLister::new(DirectoryScanner::default(), PeMetadataReader);

    let records = match lister.list(&config.target_directory, config.recursive) {
        Ok(report) => {
            info!(
                included = report.records().count(),
                skipped = report.skipped().count(),
                "scan finished"
            );
            Some(report.into_records())
        }
        Err(error) => {
            warn!(
                directory = %config.target_directory.display(),
                %error,
                "no modules listed"
            );
            None
        }
    };

    let written = write_report(records.as_deref(), &config.output_path).with_context(|| {
        format!("Failed to write report to {}", config.output_path.display())
    })?;
    if written {
        info!(destination = %config.output_path.display(), "report written");
    }

    Ok(())
}
