//! MaskInk Render Library
//!
//! Rasterization of mask forms into floating-point opacity buffers, either
//! for the full frame or for a scaled region of interest, and boolean
//! compositing of groups.

mod buffer;
mod compositor;
mod raster;
mod renderer;

pub use buffer::{MaskBuffer, PixelBox, Roi};
pub use compositor::combine_pixel;
pub use renderer::{MaskRenderer, Rasterizer};

use maskink_core::MaskError;
use thiserror::Error;

/// Rasterization errors.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error("ROI buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("PNG encoding failed: {0}")]
    Encoding(String),
}

/// Result type for rasterization.
pub type RasterResult<T> = Result<T, RasterError>;
