//! Monthly export of completed plans as CSV.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use planbot_core::{ArchiveRow, Period};
use planbot_store::write_atomic;

use crate::error::EngineError;

const HEADER: &str = "completedOn,userKey,text";

/// Writes one CSV artifact per period into a directory.
#[derive(Clone, Debug)]
pub struct ArchiveWriter {
    dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, period: Period) -> PathBuf {
        self.dir.join(format!("plans-{period}.csv"))
    }

    /// Write (or overwrite) the artifact for `period`.
    pub fn write(&self, period: Period, rows: &[ArchiveRow]) -> Result<PathBuf, EngineError> {
        let path = self.artifact_path(period);
        write_atomic(&path, render_csv(rows).as_bytes())?;
        Ok(path)
    }
}

/// Render rows as RFC 4180 CSV with a header line and CRLF line endings.
pub fn render_csv(rows: &[ArchiveRow]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 2 + rows.len() * 48);
    out.push_str(HEADER);
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&row.completed_on.format("%Y-%m-%d").to_string());
        out.push(',');
        out.push_str(&quote(row.user.as_str()));
        out.push(',');
        out.push_str(&quote(&row.text));
        out.push_str("\r\n");
    }
    out
}

fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
