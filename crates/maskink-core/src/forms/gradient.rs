//! Linear gradient form with an optional parabolic bend.
//!
//! Positions are measured in a frame rotated by `-rotation` degrees around
//! the anchor and scaled by the inverse frame diagonal. The transition line
//! is `y = curvature * x^2` in that frame; the value rises from 0 to 1 across
//! it over a width set by `compression`.

use crate::context::MaskContext;
use crate::error::{MaskError, MaskResult};
use crate::geometry::{Coord, ShapeGeometry};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Compression is floored at this value to keep the transition finite.
pub const MIN_COMPRESSION: f64 = 0.001;

/// Shape of the transition across the gradient line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientProfile {
    #[default]
    Linear,
    /// Error-function sigmoid.
    Sigmoid,
}

impl GradientProfile {
    pub fn to_bits(self) -> i32 {
        match self {
            GradientProfile::Linear => 1,
            GradientProfile::Sigmoid => 2,
        }
    }

    pub fn from_bits(bits: i32) -> Self {
        if bits == 2 {
            GradientProfile::Sigmoid
        } else {
            GradientProfile::Linear
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub anchor: Point,
    /// Degrees.
    pub rotation: f64,
    pub compression: f64,
    /// Kept with the form; the transition shape does not depend on it.
    #[serde(default)]
    pub steepness: f64,
    #[serde(default)]
    pub curvature: f64,
    #[serde(default)]
    pub profile: GradientProfile,
}

impl Gradient {
    pub fn validate(&self) -> MaskResult<()> {
        if !(self.compression.is_finite() && self.compression >= 0.0) {
            return Err(MaskError::GeometryInvalid(format!(
                "gradient compression must be >= 0, got {}",
                self.compression
            )));
        }
        if !(self.rotation.is_finite() && self.curvature.is_finite()) {
            return Err(MaskError::GeometryInvalid("gradient parameters are not finite".into()));
        }
        Ok(())
    }

    /// Sample the transition line, the band edges at `±compression` and the
    /// two rotation pivots.
    pub fn sample(&self, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
        ctx.ensure_valid()?;
        self.validate()?;
        let anchor = ctx.to_pixels(self.anchor);
        let diag = ctx.diagonal();

        let pivot = 0.1 * ctx.min_dim();
        let side1 = Vec2::from_angle(-(self.rotation - 90.0).to_radians());
        let side2 = Vec2::from_angle(-(self.rotation + 90.0).to_radians());

        let mut head = [anchor, anchor + side1 * pivot, anchor + side2 * pivot];
        let mut points = self.line(anchor, ctx);

        let offset = self.compression * diag;
        let mut line1 = self.line(anchor + side1 * offset, ctx);
        let mut line2 = self.line(anchor + side2 * offset, ctx);

        ctx.forward(&mut head, "gradient anchor")?;
        ctx.forward(&mut points, "gradient")?;
        ctx.forward(&mut line1, "gradient border")?;
        ctx.forward(&mut line2, "gradient border")?;

        // Closed band: one edge forwards, the other backwards.
        let border: Vec<Coord> = match (line1.len() > 1, line2.len() > 1) {
            (true, true) => line1
                .into_iter()
                .chain(line2.into_iter().rev())
                .map(Coord::Point)
                .collect(),
            (true, false) => line1.into_iter().map(Coord::Point).collect(),
            (false, true) => line2.into_iter().map(Coord::Point).collect(),
            (false, false) => Vec::new(),
        };

        Ok(ShapeGeometry {
            anchor: Some(head[0]),
            controls: head[1..].to_vec(),
            points,
            border,
            ..Default::default()
        })
    }

    /// The bent line through `origin`, clipped to a frame-sized margin around
    /// the image.
    fn line(&self, origin: Point, ctx: &MaskContext<'_>) -> Vec<Point> {
        let (wd, ht) = (ctx.width, ctx.height);
        let diag = ctx.diagonal();
        let (sin, cos) = (-self.rotation.to_radians()).sin_cos();
        let count = diag as usize + 3;
        let curv = self.curvature;
        let xstart = if curv.abs() > 1.0 { -(1.0 / curv.abs()).sqrt() } else { -1.0 };
        let xdelta = -2.0 * xstart / (count - 3).max(1) as f64;

        let mut out = Vec::with_capacity(count);
        let mut in_frame = false;
        for i in 0..count - 3 {
            let xi = xstart + i as f64 * xdelta;
            let yi = curv * xi * xi;
            let p = Point::new(
                (cos * xi + sin * yi) * diag + origin.x,
                (sin * xi - cos * yi) * diag + origin.y,
            );
            let inside = p.x.is_finite()
                && p.y.is_finite()
                && p.x >= -wd
                && p.x <= 2.0 * wd
                && p.y >= -ht
                && p.y <= 2.0 * ht;
            if !inside {
                if in_frame {
                    break;
                }
                continue;
            }
            in_frame = true;
            out.push(p);
        }
        out
    }

    pub fn field(&self, ctx: &MaskContext<'_>) -> GradientField {
        let (sin, cos) = (-self.rotation.to_radians()).sin_cos();
        let anchor = ctx.to_pixels(self.anchor);
        GradientField {
            cos,
            sin,
            xoffset: cos * anchor.x + sin * anchor.y,
            yoffset: sin * anchor.x - cos * anchor.y,
            inv_diag: 1.0 / ctx.diagonal(),
            compression: self.compression.max(MIN_COMPRESSION),
            curvature: self.curvature,
            profile: self.profile,
        }
    }
}

/// Closed-form gradient value in pixel space of the reference frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientField {
    cos: f64,
    sin: f64,
    xoffset: f64,
    yoffset: f64,
    inv_diag: f64,
    compression: f64,
    curvature: f64,
    profile: GradientProfile,
}

impl GradientField {
    /// Signed normalized distance from the transition line.
    pub fn distance(&self, p: Point) -> f64 {
        let x0 = (self.cos * p.x + self.sin * p.y - self.xoffset) * self.inv_diag;
        let y0 = (self.sin * p.x - self.cos * p.y - self.yoffset) * self.inv_diag;
        y0 - self.curvature * x0 * x0
    }

    pub fn value(&self, p: Point) -> f32 {
        let d = self.distance(p);
        let c = self.compression;
        if d.is_nan() || d <= -4.0 * c {
            return 0.0;
        }
        if d >= 4.0 * c {
            return 1.0;
        }
        let s = match self.profile {
            GradientProfile::Linear => d / c,
            GradientProfile::Sigmoid => libm::erf(d / c),
        };
        (0.5 + 0.5 * s).clamp(0.0, 1.0) as f32
    }
}
