//! Ellipse form.
//!
//! Rotation is in degrees. When the second radius is the larger one the
//! axes are swapped and the rotation offset by -90 degrees, so that `a` is
//! always the semi-major axis during sampling.

use super::check_border;
use super::circle::MIN_RING_SAMPLES;
use crate::context::MaskContext;
use crate::error::{MaskError, MaskResult};
use crate::geometry::{Coord, ShapeGeometry};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// How the feather width relates to the radii.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EllipseFeather {
    /// The feather adds the same distance to both radii.
    Equidistant,
    /// The feather scales both radii by `1 + border`.
    #[default]
    Proportional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point,
    pub radius_a: f64,
    pub radius_b: f64,
    /// Degrees.
    pub rotation: f64,
    pub border: f64,
    #[serde(default)]
    pub feather: EllipseFeather,
}

/// Semi-axes and orientation in pixels, major axis first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseAxes {
    pub a: f64,
    pub b: f64,
    /// Radians.
    pub angle: f64,
}

impl Ellipse {
    pub fn validate(&self) -> MaskResult<()> {
        for r in [self.radius_a, self.radius_b] {
            if !(r.is_finite() && r >= 0.0) {
                return Err(MaskError::GeometryInvalid(format!(
                    "ellipse radius must be >= 0, got {r}"
                )));
            }
        }
        if !self.rotation.is_finite() {
            return Err(MaskError::GeometryInvalid("ellipse rotation is not finite".into()));
        }
        check_border(self.border, "ellipse")
    }

    /// Outer radii of the feather, in normalized units.
    pub fn total_radii(&self) -> (f64, f64) {
        match self.feather {
            EllipseFeather::Proportional => (
                self.radius_a * (1.0 + self.border),
                self.radius_b * (1.0 + self.border),
            ),
            EllipseFeather::Equidistant => (self.radius_a + self.border, self.radius_b + self.border),
        }
    }

    fn axes(&self, ra: f64, rb: f64, ctx: &MaskContext<'_>) -> EllipseAxes {
        let m = ctx.min_dim();
        if ra >= rb {
            EllipseAxes {
                a: ra * m,
                b: rb * m,
                angle: self.rotation.to_radians(),
            }
        } else {
            EllipseAxes {
                a: rb * m,
                b: ra * m,
                angle: (self.rotation - 90.0).to_radians(),
            }
        }
    }

    /// Inner axes in pixels.
    pub fn inner_axes(&self, ctx: &MaskContext<'_>) -> EllipseAxes {
        self.axes(self.radius_a, self.radius_b, ctx)
    }

    /// Feather axes in pixels.
    pub fn outer_axes(&self, ctx: &MaskContext<'_>) -> EllipseAxes {
        let (ta, tb) = self.total_radii();
        self.axes(ta, tb, ctx)
    }

    pub fn sample(&self, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
        ctx.ensure_valid()?;
        self.validate()?;
        let center = ctx.to_pixels(self.center);
        let inner = self.inner_axes(ctx);

        let mut anchor = [center];
        let mut controls = axis_ends(center, inner).to_vec();
        let mut points = ellipse_ring(center, inner);
        let mut border = ellipse_ring(center, self.outer_axes(ctx));
        ctx.forward(&mut anchor, "ellipse center")?;
        ctx.forward(&mut controls, "ellipse axes")?;
        ctx.forward(&mut points, "ellipse")?;
        ctx.forward(&mut border, "ellipse border")?;

        Ok(ShapeGeometry {
            anchor: Some(anchor[0]),
            controls,
            points,
            border: border.into_iter().map(Coord::Point).collect(),
            ..Default::default()
        })
    }

    /// Outer edge of the feather, untransformed, in pixels.
    pub fn outline(&self, ctx: &MaskContext<'_>) -> Vec<Point> {
        ellipse_ring(ctx.to_pixels(self.center), self.outer_axes(ctx))
    }

    pub fn falloff(&self, ctx: &MaskContext<'_>) -> EllipseFalloff {
        let m = ctx.min_dim();
        let inner = self.inner_axes(ctx);
        let (ta, tb) = self.total_radii();
        // Pair the feather radii the same way as the inner ones.
        let (ta, tb) = if self.radius_a >= self.radius_b { (ta, tb) } else { (tb, ta) };
        EllipseFalloff {
            center: ctx.to_pixels(self.center),
            a2: inner.a * inner.a,
            b2: inner.b * inner.b,
            ta2: ta * ta * m * m,
            tb2: tb * tb * m * m,
            cos: inner.angle.cos(),
            sin: inner.angle.sin(),
        }
    }
}

/// Ramanujan's approximation of the perimeter.
pub fn perimeter(a: f64, b: f64) -> f64 {
    if a + b <= 0.0 {
        return 0.0;
    }
    let lambda = (a - b) / (a + b);
    let l2 = lambda * lambda;
    PI * (a + b) * (1.0 + 3.0 * l2 / (10.0 + (4.0 - 3.0 * l2).sqrt()))
}

fn axis_ends(center: Point, axes: EllipseAxes) -> [Point; 4] {
    let major = Vec2::from_angle(axes.angle) * axes.a;
    let minor = Vec2::from_angle(axes.angle - FRAC_PI_2) * axes.b;
    [center + major, center - major, center + minor, center - minor]
}

/// About one sample per pixel of perimeter.
pub fn ellipse_ring(center: Point, axes: EllipseAxes) -> Vec<Point> {
    let n = (perimeter(axes.a, axes.b) as usize).max(MIN_RING_SAMPLES);
    let (sin, cos) = axes.angle.sin_cos();
    (0..n)
        .map(|i| {
            let t = TAU * i as f64 / n as f64;
            let (ea, eb) = (axes.a * t.cos(), axes.b * t.sin());
            Point::new(center.x + ea * cos - eb * sin, center.y + ea * sin + eb * cos)
        })
        .collect()
}

/// Opacity of an ellipse. A direction from the center is projected onto the
/// inner and outer ellipse and the squared ratio of squared distances is used,
/// as for circles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseFalloff {
    pub center: Point,
    a2: f64,
    b2: f64,
    ta2: f64,
    tb2: f64,
    cos: f64,
    sin: f64,
}

impl EllipseFalloff {
    pub fn value(&self, p: Point) -> f32 {
        let d = p - self.center;
        let l2 = d.hypot2();
        let l = l2.sqrt();
        let (xn, yn) = if l > 0.0 { (d.x / l, d.y / l) } else { (0.0, 1.0) };
        let xr = xn * self.cos + yn * self.sin;
        let yr = -xn * self.sin + yn * self.cos;
        let cos2 = xr * xr;
        let sin2 = yr * yr;

        let radius2 = self.a2 * self.b2 / (self.a2 * sin2 + self.b2 * cos2);
        let total2 = self.ta2 * self.tb2 / (self.ta2 * sin2 + self.tb2 * cos2);
        let ratio = (total2 - l2) / (total2 - radius2);
        let f = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        (f * f) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ellipse(a: f64, b: f64, rotation: f64, feather: EllipseFeather) -> Ellipse {
        Ellipse {
            center: Point::new(0.5, 0.5),
            radius_a: a,
            radius_b: b,
            rotation,
            border: 0.1,
            feather,
        }
    }

    #[test]
    fn test_perimeter_matches_circle() {
        assert!((perimeter(10.0, 10.0) - TAU * 10.0).abs() < 1e-9);
        assert!(perimeter(20.0, 5.0) > perimeter(10.0, 5.0));
    }

    #[test]
    fn test_feather_modes() {
        let p = ellipse(0.2, 0.1, 0.0, EllipseFeather::Proportional).total_radii();
        assert!((p.0 - 0.22).abs() < 1e-12 && (p.1 - 0.11).abs() < 1e-12);
        let e = ellipse(0.2, 0.1, 0.0, EllipseFeather::Equidistant).total_radii();
        assert!((e.0 - 0.3).abs() < 1e-12 && (e.1 - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_swapped_axes_same_shape() {
        let ctx = MaskContext::new(200.0, 200.0);
        let wide = ellipse(0.2, 0.1, 0.0, EllipseFeather::Equidistant).falloff(&ctx);
        let tall = ellipse(0.1, 0.2, 90.0, EllipseFeather::Equidistant).falloff(&ctx);
        for p in [Point::new(140.0, 100.0), Point::new(100.0, 125.0), Point::new(150.0, 130.0)] {
            assert!((wide.value(p) - tall.value(p)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_falloff_inside_outside() {
        let ctx = MaskContext::new(200.0, 200.0);
        let f = ellipse(0.2, 0.1, 30.0, EllipseFeather::Proportional).falloff(&ctx);
        assert_eq!(f.value(Point::new(100.0, 100.0)), 1.0);
        assert_eq!(f.value(Point::new(199.0, 199.0)), 0.0);
    }

    #[test]
    fn test_sample_controls_and_ring() {
        let ctx = MaskContext::new(200.0, 100.0);
        let g = ellipse(0.3, 0.1, 0.0, EllipseFeather::Proportional).sample(&ctx).unwrap();
        assert_eq!(g.controls.len(), 4);
        assert!((g.controls[0].x - 130.0).abs() < 1e-9);
        let expected = perimeter(30.0, 10.0) as usize;
        assert_eq!(g.points.len(), expected);
        assert!(g.border.len() > g.points.len());
    }
}
