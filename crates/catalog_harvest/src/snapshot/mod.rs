//! Snapshot persistence for harvested record sets

use crate::harvest::HarvestError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Saves and loads named record sets.
pub trait SnapshotStore {
    fn save<T: Serialize + ?Sized>(&self, name: &str, records: &T) -> Result<(), HarvestError>;

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, HarvestError>;
}

/// Writes each record set as `<dir>/<name>.json`.
pub struct JsonSnapshotStore {
    dir: PathBuf,
}

impl JsonSnapshotStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Checks if a snapshot exists for `name`
    pub fn has_snapshot(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }
}

impl SnapshotStore for JsonSnapshotStore {
    /// Writes to a temporary file first so a crash never leaves a torn snapshot.
    fn save<T: Serialize + ?Sized>(&self, name: &str, records: &T) -> Result<(), HarvestError> {
        fs::create_dir_all(&self.dir).map_err(|e| HarvestError::snapshot(name, e))?;

        let json = serde_json::to_string_pretty(records).map_err(|e| HarvestError::snapshot(name, e))?;
        let path = self.path_for(name);
        let tmp_path = self.dir.join(format!("{name}.json.tmp"));

        fs::write(&tmp_path, json).map_err(|e| HarvestError::snapshot(name, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| HarvestError::snapshot(name, e))?;

        debug!(path = %path.display(), "Wrote snapshot");
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, HarvestError> {
        let path = self.path_for(name);
        let content = fs::read_to_string(&path)
            .map_err(|e| HarvestError::snapshot(name, format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| HarvestError::snapshot(name, e))
    }
}
