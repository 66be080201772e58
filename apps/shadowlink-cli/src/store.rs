//! JSON snapshot file backing the CLI.
//!
//! The whole site (declared kinds, records, metadata) is loaded into a
//! [`MemoryStore`] and written back after a live pass.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use shadowlink_sync::{MemoryStore, Snapshot};

use crate::error::{CliError, CliResult};

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file into a fresh store.
    pub fn load(&self) -> CliResult<Arc<MemoryStore>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            CliError::DataFile(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        debug!(
            path = %self.path.display(),
            sources = snapshot.sources.len(),
            mirrors = snapshot.mirrors.len(),
            "Snapshot loaded"
        );
        Ok(Arc::new(MemoryStore::from_snapshot(snapshot)?))
    }

    /// Write the store back.
    ///
    /// The new contents go to a sibling temp file which then replaces the
    /// original, so a crash never leaves a half-written snapshot.
    pub fn save(&self, store: &MemoryStore) -> CliResult<()> {
        let json = serde_json::to_string_pretty(&store.snapshot())?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), "Snapshot saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "shadowlink.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
