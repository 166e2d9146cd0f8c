use std::io::{self, Write};
use std::path::{Path, PathBuf};

use planbot_core::PlanBook;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;

/// The JSON file holding every user's ledger.
#[derive(Clone, Debug)]
pub struct LedgerDocument {
    path: PathBuf,
}

impl LedgerDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted book.
    ///
    /// A missing, unreadable or malformed file yields an empty book: the
    /// content is lost rather than the process refusing to serve.
    pub fn load(&self) -> PlanBook {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "ledger document not found, starting empty");
                return PlanBook::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger document unreadable, starting empty");
                return PlanBook::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(book) => book,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger document malformed, starting empty");
                PlanBook::new()
            }
        }
    }

    /// Replace the persisted book. On failure the previous file is left as it was.
    pub fn save(&self, book: &PlanBook) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(book)?;
        write_atomic(&self.path, &json)
    }
}

/// Write `bytes` to `path` through a synced temp file in the same directory,
/// then rename it over the destination.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| StoreError::Unavailable(format!("create dir {}: {e}", dir.display())))?;

    let unavailable = |e: io::Error| StoreError::Unavailable(format!("write {}: {e}", path.display()));
    let mut tmp = NamedTempFile::new_in(dir).map_err(unavailable)?;
    tmp.write_all(bytes).map_err(unavailable)?;
    tmp.as_file().sync_all().map_err(unavailable)?;
    tmp.persist(path).map_err(|e| unavailable(e.error))?;
    Ok(())
}
