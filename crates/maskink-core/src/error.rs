//! Error types shared by the sampling and rasterization layers.

use crate::forms::FormId;
use thiserror::Error;

/// Errors produced while sampling or rasterizing a form.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MaskError {
    #[error("Invalid geometry: {0}")]
    GeometryInvalid(String),
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),
    #[error("Transform rejected: {0}")]
    TransformRejected(String),
    #[error("Self-intersection grid too small ({width}x{height})")]
    SelfIntersectionGridTooSmall { width: i64, height: i64 },
    #[error("Form not found: {0}")]
    FormNotFound(FormId),
}

/// Result type for sampling and rasterization.
pub type MaskResult<T> = Result<T, MaskError>;

/// Allocate a vector with room for `len` elements, reporting failure instead of aborting.
pub fn try_alloc<T>(len: usize, what: &str) -> MaskResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| MaskError::AllocationFailed(format!("{what}: {e}")))?;
    Ok(v)
}

/// Allocate a zero-filled buffer of `len` floats.
pub fn try_zeroed(len: usize, what: &str) -> MaskResult<Vec<f32>> {
    let mut v = try_alloc(len, what)?;
    v.resize(len, 0.0);
    Ok(v)
}
