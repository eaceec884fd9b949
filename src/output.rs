use std::fs;
use std::io;
use std::path::Path;

use crate::binary::VersionRecord;
use crate::scanner::is_blank_path;

pub const HEADER: &str = "Name; FileVersion; ProductVersion";
pub const DELIMITER: &str = "; ";

pub fn render_report(records: &[VersionRecord]) -> String {
    let mut report = String::with_capacity(HEADER.len() + 1 + records.len() * 32);
    report.push_str(HEADER);
    report.push('\n');

    for record in records {
        report.push_str(&format!(
            "{}{DELIMITER}{}{DELIMITER}{}\n",
            record.name, record.file_version, record.product_version
        ));
    }

    report
}

/// Write the report to `destination`, replacing any existing file.
///
/// Absent records or a blank destination mean there is nothing to do: no file is
/// touched and `Ok(false)` is returned.
pub fn write_report(records: Option<&[VersionRecord]>, destination: &Path) -> io::Result<bool> {
    let Some(records) = records else {
        return Ok(false);
    };
    if is_blank_path(destination) {
        return Ok(false);
    }

    fs::write(destination, render_report(records))?;
    Ok(true)
}
