//! Per-call context: frame dimensions, distortion port and creation defaults.

use crate::error::{MaskError, MaskResult};
use crate::forms::{EllipseFeather, GradientProfile};
use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};

/// Geometric transform chain of the host pipeline.
///
/// Points are in pipeline pixel coordinates. Implementations return `false`
/// when a point falls outside the domain they can map.
pub trait DistortionPort: Send + Sync {
    /// Map shape-local pixel coordinates to output (distorted) coordinates.
    fn forward_transform(&self, points: &mut [Point]) -> bool;

    /// Map output coordinates back to shape-local pixel coordinates.
    fn backward_transform(&self, points: &mut [Point]) -> bool;
}

/// A distortion port that leaves every point where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDistortion;

impl DistortionPort for IdentityDistortion {
    fn forward_transform(&self, _points: &mut [Point]) -> bool {
        true
    }

    fn backward_transform(&self, _points: &mut [Point]) -> bool {
        true
    }
}

static IDENTITY: IdentityDistortion = IdentityDistortion;

/// A distortion port applying a fixed affine map (crop, rotation, scale).
#[derive(Debug, Clone, Copy)]
pub struct AffineDistortion {
    forward: Affine,
}

impl AffineDistortion {
    pub fn new(forward: Affine) -> Self {
        Self { forward }
    }
}

impl DistortionPort for AffineDistortion {
    fn forward_transform(&self, points: &mut [Point]) -> bool {
        for p in points.iter_mut() {
            *p = self.forward * *p;
        }
        true
    }

    fn backward_transform(&self, points: &mut [Point]) -> bool {
        if self.forward.determinant().abs() < f64::EPSILON {
            return false;
        }
        let inverse = self.forward.inverse();
        for p in points.iter_mut() {
            *p = inverse * *p;
        }
        true
    }
}

fn default_circle_size() -> f64 {
    0.05
}

fn default_border() -> f64 {
    0.05
}

fn default_ellipse_radius_a() -> f64 {
    0.05
}

fn default_ellipse_radius_b() -> f64 {
    0.035
}

fn default_brush_hardness() -> f64 {
    0.66
}

fn default_one() -> f64 {
    1.0
}

fn default_gradient_compression() -> f64 {
    0.5
}

/// Defaults applied when the editing layer creates new shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskDefaults {
    #[serde(default = "default_circle_size")]
    pub circle_size: f64,
    #[serde(default = "default_border")]
    pub circle_border: f64,
    #[serde(default = "default_ellipse_radius_a")]
    pub ellipse_radius_a: f64,
    #[serde(default = "default_ellipse_radius_b")]
    pub ellipse_radius_b: f64,
    #[serde(default = "default_border")]
    pub ellipse_border: f64,
    #[serde(default)]
    pub ellipse_rotation: f64,
    #[serde(default)]
    pub ellipse_feather: EllipseFeather,
    #[serde(default = "default_border")]
    pub path_border: f64,
    #[serde(default = "default_border")]
    pub brush_border: f64,
    #[serde(default = "default_brush_hardness")]
    pub brush_hardness: f64,
    #[serde(default = "default_one")]
    pub brush_density: f64,
    #[serde(default = "default_gradient_compression")]
    pub gradient_compression: f64,
    #[serde(default)]
    pub gradient_steepness: f64,
    #[serde(default)]
    pub gradient_curvature: f64,
    #[serde(default)]
    pub gradient_profile: GradientProfile,
    /// Opacity given to a form when it joins a group.
    #[serde(default = "default_one")]
    pub group_opacity: f64,
}

impl Default for MaskDefaults {
    fn default() -> Self {
        Self {
            circle_size: default_circle_size(),
            circle_border: default_border(),
            ellipse_radius_a: default_ellipse_radius_a(),
            ellipse_radius_b: default_ellipse_radius_b(),
            ellipse_border: default_border(),
            ellipse_rotation: 0.0,
            ellipse_feather: EllipseFeather::default(),
            path_border: default_border(),
            brush_border: default_border(),
            brush_hardness: default_brush_hardness(),
            brush_density: default_one(),
            gradient_compression: default_gradient_compression(),
            gradient_steepness: 0.0,
            gradient_curvature: 0.0,
            gradient_profile: GradientProfile::default(),
            group_opacity: default_one(),
        }
    }
}

impl MaskDefaults {
    /// Parse defaults from JSON. Missing fields keep their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Explicit context passed to every sampling and rasterization call.
#[derive(Clone)]
pub struct MaskContext<'a> {
    /// Reference frame width in pixels.
    pub width: f64,
    /// Reference frame height in pixels.
    pub height: f64,
    /// Host pipeline transforms.
    pub distortion: &'a dyn DistortionPort,
    /// Shape creation defaults.
    pub defaults: MaskDefaults,
}

impl<'a> MaskContext<'a> {
    /// Create a context for a frame of the given size with no distortion.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            distortion: &IDENTITY,
            defaults: MaskDefaults::default(),
        }
    }

    /// Set the distortion port.
    pub fn with_distortion(mut self, distortion: &'a dyn DistortionPort) -> Self {
        self.distortion = distortion;
        self
    }

    /// Set the shape defaults.
    pub fn with_defaults(mut self, defaults: MaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width >= 1.0 && self.height >= 1.0
    }

    /// Fail with `GeometryInvalid` unless the frame has a usable size.
    pub fn ensure_valid(&self) -> MaskResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(MaskError::GeometryInvalid(format!(
                "invalid frame dimensions {}x{}",
                self.width, self.height
            )))
        }
    }

    /// Shorter frame side; radii and borders scale by it.
    pub fn min_dim(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    /// Frame size rounded down to whole pixels.
    pub fn frame_size(&self) -> (usize, usize) {
        (self.width as usize, self.height as usize)
    }

    /// Convert a normalized point to pixel coordinates.
    pub fn to_pixels(&self, p: Point) -> Point {
        Point::new(p.x * self.width, p.y * self.height)
    }

    /// Run the forward transform, mapping a refusal to `TransformRejected`.
    pub fn forward(&self, points: &mut [Point], what: &str) -> MaskResult<()> {
        if points.is_empty() || self.distortion.forward_transform(points) {
            Ok(())
        } else {
            Err(MaskError::TransformRejected(format!("forward transform of {what}")))
        }
    }

    /// Run the backward transform, mapping a refusal to `TransformRejected`.
    pub fn backward(&self, points: &mut [Point], what: &str) -> MaskResult<()> {
        if points.is_empty() || self.distortion.backward_transform(points) {
            Ok(())
        } else {
            Err(MaskError::TransformRejected(format!("backward transform of {what}")))
        }
    }
}

impl std::fmt::Debug for MaskContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskContext")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
