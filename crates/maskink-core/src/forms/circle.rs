//! Circle form.

use super::check_border;
use crate::context::MaskContext;
use crate::error::{MaskError, MaskResult};
use crate::geometry::{Coord, ShapeGeometry};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Fewest samples used for any ring.
pub const MIN_RING_SAMPLES: usize = 8;

/// A circle with a quadratic feather ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Center in normalized image units.
    pub center: Point,
    /// Radius relative to the shorter frame side.
    pub radius: f64,
    /// Feather width relative to the shorter frame side.
    pub border: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64, border: f64) -> Self {
        Self {
            center,
            radius,
            border,
        }
    }

    pub fn validate(&self) -> MaskResult<()> {
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(MaskError::GeometryInvalid(format!(
                "circle radius must be >= 0, got {}",
                self.radius
            )));
        }
        check_border(self.border, "circle")
    }

    /// Sample the circle and its feather ring in pipeline pixel space.
    pub fn sample(&self, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
        ctx.ensure_valid()?;
        self.validate()?;
        let center = ctx.to_pixels(self.center);
        let r = self.radius * ctx.min_dim();
        let total = (self.radius + self.border) * ctx.min_dim();

        let mut anchor = [center];
        let mut points = ring(center, r);
        let mut border = ring(center, total);
        ctx.forward(&mut anchor, "circle center")?;
        ctx.forward(&mut points, "circle")?;
        ctx.forward(&mut border, "circle border")?;

        Ok(ShapeGeometry {
            anchor: Some(anchor[0]),
            points,
            border: border.into_iter().map(Coord::Point).collect(),
            ..Default::default()
        })
    }

    /// Outer edge of the feather, untransformed, in pixels.
    pub fn outline(&self, ctx: &MaskContext<'_>) -> Vec<Point> {
        ring(ctx.to_pixels(self.center), (self.radius + self.border) * ctx.min_dim())
    }

    /// Analytic falloff in pixel space of the reference frame.
    pub fn falloff(&self, ctx: &MaskContext<'_>) -> CircleFalloff {
        let r = self.radius * ctx.min_dim();
        let t = (self.radius + self.border) * ctx.min_dim();
        CircleFalloff {
            center: ctx.to_pixels(self.center),
            radius2: r * r,
            total2: t * t,
        }
    }
}

/// Samples on a circle of radius `r`, about one per pixel of arc length.
pub fn ring(center: Point, r: f64) -> Vec<Point> {
    let n = ((TAU * r).ceil() as usize).max(MIN_RING_SAMPLES);
    (0..n)
        .map(|i| {
            let a = TAU * i as f64 / n as f64;
            Point::new(center.x + r * a.cos(), center.y + r * a.sin())
        })
        .collect()
}

/// Opacity of a circle as a function of distance from its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleFalloff {
    pub center: Point,
    pub radius2: f64,
    pub total2: f64,
}

impl CircleFalloff {
    /// 1 inside the radius, 0 beyond the feather, squared ratio in between.
    pub fn value(&self, p: Point) -> f32 {
        let l2 = (p - self.center).hypot2();
        if l2 < self.radius2 {
            1.0
        } else if l2 < self.total2 {
            let f = (self.total2 - l2) / (self.total2 - self.radius2);
            (f * f) as f32
        } else {
            0.0
        }
    }
}
