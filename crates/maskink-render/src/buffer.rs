//! Mask buffers and pixel regions.

use crate::{RasterError, RasterResult};
use kurbo::{Point, Rect};
use maskink_core::MaskResult;
use maskink_core::error::{try_alloc, try_zeroed};

/// Integer pixel rectangle in pipeline space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBox {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

impl PixelBox {
    pub fn new(x: i64, y: i64, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box holding every pixel touched by `rect`, grown by `pad` on each side.
    pub fn enclosing(rect: Rect, pad: i64) -> Self {
        let x0 = rect.x0.floor() as i64 - pad;
        let y0 = rect.y0.floor() as i64 - pad;
        let x1 = rect.x1.ceil() as i64 + pad;
        let y1 = rect.y1.ceil() as i64 + pad;
        Self::new(x0, y0, (x1 - x0 + 1).max(0) as usize, (y1 - y0 + 1).max(0) as usize)
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// One past the last column.
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    /// One past the last row.
    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn union(&self, other: &PixelBox) -> PixelBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let r = self.right().max(other.right());
        let b = self.bottom().max(other.bottom());
        PixelBox::new(x, y, (r - x) as usize, (b - y) as usize)
    }
}

/// A rasterized mask covering `width * height` pixels at offset `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskBuffer {
    /// Row-major opacity values in [0, 1].
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub x: i64,
    pub y: i64,
}

impl MaskBuffer {
    /// A zero-filled buffer over `area`.
    pub fn zeroed(area: PixelBox) -> MaskResult<Self> {
        Ok(Self {
            data: try_zeroed(area.len(), "mask buffer")?,
            width: area.width,
            height: area.height,
            x: area.x,
            y: area.y,
        })
    }

    pub fn area(&self) -> PixelBox {
        PixelBox::new(self.x, self.y, self.width, self.height)
    }

    /// Value at a pipeline pixel position; 0 outside the buffer.
    pub fn get(&self, x: i64, y: i64) -> f32 {
        if !self.area().contains(x, y) {
            return 0.0;
        }
        let idx = (y - self.y) as usize * self.width + (x - self.x) as usize;
        self.data[idx]
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Encode as an 8-bit grayscale PNG.
    pub fn encode_png(&self) -> RasterResult<Vec<u8>> {
        let mut pixels = try_alloc::<u8>(self.data.len(), "png pixels")?;
        pixels.extend(
            self.data
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8),
        );

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width as u32, self.height as u32);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RasterError::Encoding(e.to_string()))?;
            writer
                .write_image_data(&pixels)
                .map_err(|e| RasterError::Encoding(e.to_string()))?;
            writer
                .finish()
                .map_err(|e| RasterError::Encoding(e.to_string()))?;
        }
        Ok(out)
    }
}

/// Region of interest at a downsample scale.
///
/// Output pixel `(i, j)` sits at pipeline position
/// `((x + i) / scale, (y + j) / scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
    pub scale: f64,
}

impl Roi {
    pub fn new(x: i64, y: i64, width: usize, height: usize, scale: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale,
        }
    }

    /// The whole frame at full resolution.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height, 1.0)
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pipeline position of an output pixel.
    pub fn frame_point(&self, i: f64, j: f64) -> Point {
        Point::new((self.x as f64 + i) / self.scale, (self.y as f64 + j) / self.scale)
    }
}
