//! File-based mask store.

use super::{BoxFuture, MaskStore, StoreError, StoreResult};
use crate::record::FormRecord;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "masks-";

/// Stores the records of each image as one JSON file in a directory.
pub struct FileMaskStore {
    base_path: PathBuf,
}

impl FileMaskStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StoreResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StoreError::Io(format!("Failed to create store directory: {e}"))
            })?;
        }
        Ok(Self { base_path })
    }

    fn image_path(&self, image_id: i64) -> PathBuf {
        self.base_path.join(format!("{FILE_PREFIX}{image_id}.json"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Image id encoded in a store file name, if it is one of ours.
fn parse_image_id(path: &Path) -> Option<i64> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .parse()
        .ok()
}

impl MaskStore for FileMaskStore {
    fn save(&self, image_id: i64, records: &[FormRecord]) -> BoxFuture<'_, StoreResult<()>> {
        let path = self.image_path(image_id);
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()));
        Box::pin(async move {
            let json = json?;
            fs::write(&path, json)
                .map_err(|e| StoreError::Io(format!("Failed to write {}: {e}", path.display())))
        })
    }

    fn load(&self, image_id: i64) -> BoxFuture<'_, StoreResult<Vec<FormRecord>>> {
        let path = self.image_path(image_id);
        Box::pin(async move {
            if !path.exists() {
                return Err(StoreError::NotFound(image_id));
            }
            let json = fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("Failed to read {}: {e}", path.display())))?;
            serde_json::from_str(&json).map_err(|e| {
                StoreError::Serialization(format!("Failed to parse {}: {e}", path.display()))
            })
        })
    }

    fn delete(&self, image_id: i64) -> BoxFuture<'_, StoreResult<()>> {
        let path = self.image_path(image_id);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StoreError::Io(format!("Failed to delete {}: {e}", path.display()))
                })?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<i64>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries = fs::read_dir(&base)
                .map_err(|e| StoreError::Io(format!("Failed to read directory: {e}")))?;
            Ok(entries
                .flatten()
                .filter_map(|entry| parse_image_id(&entry.path()))
                .collect())
        })
    }

    fn exists(&self, image_id: i64) -> BoxFuture<'_, StoreResult<bool>> {
        let path = self.image_path(image_id);
        Box::pin(async move { Ok(path.exists()) })
    }
}
