//! Pixel fill kernels shared by the full-frame and ROI paths.

pub(crate) mod analytic;
pub(crate) mod mesh;
pub(crate) mod polygon;
pub(crate) mod strip;

use kurbo::{Point, Vec2};
use maskink_core::MaskResult;

/// Run `f` on every row of a row-major buffer, in parallel with the
/// `multithreading` feature.
pub(crate) fn try_fill_rows<F>(data: &mut [f32], width: usize, f: F) -> MaskResult<()>
where
    F: Fn(usize, &mut [f32]) -> MaskResult<()> + Send + Sync,
{
    if width == 0 {
        return Ok(());
    }
    #[cfg(feature = "multithreading")]
    {
        use rayon::prelude::*;
        data.par_chunks_mut(width)
            .enumerate()
            .try_for_each(|(y, row)| f(y, row))
    }
    #[cfg(not(feature = "multithreading"))]
    {
        data.chunks_mut(width)
            .enumerate()
            .try_for_each(|(y, row)| f(y, row))
    }
}

/// Mapping from pipeline positions to the pixel grid of an output buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GridMap {
    pub origin: Vec2,
    pub scale: f64,
}

impl GridMap {
    pub fn new(origin: Vec2, scale: f64) -> Self {
        Self { origin, scale }
    }

    pub fn map(&self, p: Point) -> Point {
        Point::new(p.x * self.scale, p.y * self.scale) - self.origin
    }
}

/// Mutable view of a row-major grid.
pub(crate) struct Grid<'a> {
    pub data: &'a mut [f32],
    pub width: usize,
    pub height: usize,
}

impl<'a> Grid<'a> {
    pub fn new(data: &'a mut [f32], width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Raise the value at `(x, y)` to at least `v`, ignoring positions off the grid.
    pub fn raise(&mut self, x: i64, y: i64, v: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if self.data[idx] < v {
            self.data[idx] = v;
        }
    }
}
