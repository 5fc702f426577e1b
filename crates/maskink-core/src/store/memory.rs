//! In-memory mask store.

use super::{BoxFuture, MaskStore, StoreError, StoreResult};
use crate::record::FormRecord;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory store for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryMaskStore {
    images: RwLock<HashMap<i64, Vec<FormRecord>>>,
}

impl MemoryMaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Other(format!("Lock error: {e}"))
}

impl MaskStore for MemoryMaskStore {
    fn save(&self, image_id: i64, records: &[FormRecord]) -> BoxFuture<'_, StoreResult<()>> {
        let records = records.to_vec();
        Box::pin(async move {
            let mut images = self.images.write().map_err(lock_error)?;
            images.insert(image_id, records);
            Ok(())
        })
    }

    fn load(&self, image_id: i64) -> BoxFuture<'_, StoreResult<Vec<FormRecord>>> {
        Box::pin(async move {
            let images = self.images.read().map_err(lock_error)?;
            images
                .get(&image_id)
                .cloned()
                .ok_or(StoreError::NotFound(image_id))
        })
    }

    fn delete(&self, image_id: i64) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut images = self.images.write().map_err(lock_error)?;
            images.remove(&image_id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<i64>>> {
        Box::pin(async move {
            let images = self.images.read().map_err(lock_error)?;
            Ok(images.keys().copied().collect())
        })
    }

    fn exists(&self, image_id: i64) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let images = self.images.read().map_err(lock_error)?;
            Ok(images.contains_key(&image_id))
        })
    }
}
