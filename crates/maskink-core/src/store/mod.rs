//! Mask store abstraction for persisted form records.

mod file;
mod memory;

pub use file::FileMaskStore;
pub use memory::MemoryMaskStore;

use crate::record::FormRecord;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No masks stored for image {0}")]
    NotFound(i64),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Store error: {0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend holding the form records of each image.
///
/// Saving replaces the whole record set of an image.
pub trait MaskStore: Send + Sync {
    /// Save the records of an image.
    fn save(&self, image_id: i64, records: &[FormRecord]) -> BoxFuture<'_, StoreResult<()>>;

    /// Load the records of an image.
    fn load(&self, image_id: i64) -> BoxFuture<'_, StoreResult<Vec<FormRecord>>>;

    /// Delete the records of an image.
    fn delete(&self, image_id: i64) -> BoxFuture<'_, StoreResult<()>>;

    /// List the images that have records.
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<i64>>>;

    /// Check if an image has records.
    fn exists(&self, image_id: i64) -> BoxFuture<'_, StoreResult<bool>>;
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
