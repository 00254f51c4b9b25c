use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn, Logger};
use tempfile::NamedTempFile;

use crate::errors::CatalogError;
use crate::experience::Experience;
use crate::normalization::normalize;

/// The key the whole catalog is saved under.
pub const STORAGE_KEY: &str = "experiences_data";

/// A local copy of the entire catalog, kept as a single JSON document
/// named after [`STORAGE_KEY`].
///
/// Every write replaces the previous snapshot; there is no versioning
/// and the last writer wins.
///
/// [`load`](Self::load) and [`save`](Self::save) run the file I/O on
/// tokio's blocking pool and are what async callers use.
#[derive(Clone)]
pub struct LocalStore {
    logger: Arc<Logger>,
    directory: PathBuf,
}

impl LocalStore {
    pub fn new(logger: Arc<Logger>, directory: impl Into<PathBuf>) -> Self {
        LocalStore {
            logger,
            directory: directory.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", STORAGE_KEY))
    }

    /// Reads the snapshot. A missing, unreadable or malformed snapshot
    /// is logged and treated as empty.
    pub fn read(&self) -> Vec<Experience> {
        let path = self.path();

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(self.logger, "No local snapshot yet"; "path" => %path.display());
                return vec![];
            }
            Err(e) => {
                warn!(self.logger, "Failed to read local snapshot"; "path" => %path.display(), "error" => %e);
                return vec![];
            }
        };

        match serde_json::from_str::<Vec<Experience>>(&raw) {
            Ok(experiences) => experiences.into_iter().map(normalize).collect(),
            Err(e) => {
                warn!(self.logger, "Ignoring malformed local snapshot"; "path" => %path.display(), "error" => %e);
                vec![]
            }
        }
    }

    /// Replaces the snapshot with the given catalog.
    pub fn write(&self, experiences: &[Experience]) -> Result<(), CatalogError> {
        let serialized = serde_json::to_vec(experiences)?;

        fs::create_dir_all(&self.directory).map_err(|e| CatalogError::io(&self.directory, e))?;

        // written next to the target so the rename can't cross devices
        let mut file =
            NamedTempFile::new_in(&self.directory).map_err(|e| CatalogError::io(&self.directory, e))?;
        file.write_all(&serialized)
            .map_err(|e| CatalogError::io(file.path(), e))?;

        let path = self.path();
        file.persist(&path)
            .map_err(|e| CatalogError::io(&path, e.error))?;

        debug!(self.logger, "Saved local snapshot"; "path" => %path.display(), "count" => experiences.len());

        Ok(())
    }

    pub async fn load(&self) -> Vec<Experience> {
        let store = self.clone();

        match tokio::task::spawn_blocking(move || store.read()).await {
            Ok(experiences) => experiences,
            Err(e) => {
                warn!(self.logger, "Local snapshot read was interrupted"; "error" => %e);
                vec![]
            }
        }
    }

    pub async fn save(&self, experiences: Arc<Vec<Experience>>) -> Result<(), CatalogError> {
        let store = self.clone();

        tokio::task::spawn_blocking(move || store.write(&experiences))
            .await
            .map_err(|source| CatalogError::Task { source })?
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
