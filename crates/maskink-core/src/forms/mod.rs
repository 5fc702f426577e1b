//! Mask form definitions.

mod brush;
mod circle;
mod ellipse;
mod gradient;
mod group;
mod path;

pub use brush::{Brush, BrushPoint};
pub use circle::{Circle, CircleFalloff, MIN_RING_SAMPLES};
pub use ellipse::{Ellipse, EllipseAxes, EllipseFalloff, EllipseFeather};
pub use gradient::{Gradient, GradientField, GradientProfile, MIN_COMPRESSION};
pub use group::{CombineOp, Group, GroupMember, MemberState};
pub use path::{Path, PathPoint};

use crate::context::MaskDefaults;
use crate::error::{MaskError, MaskResult};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for forms.
pub type FormId = Uuid;

/// Current form data version.
pub const FORMS_VERSION: u32 = 6;

fn default_version() -> u32 {
    FORMS_VERSION
}

/// Smoothing state of a path or brush corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointState {
    /// Control points follow a Catmull-Rom spline through the neighbours.
    #[default]
    Normal,
    /// Control points were placed by hand (or collapse onto the corner).
    UserEdited,
}

impl PointState {
    pub fn to_bits(self) -> i32 {
        match self {
            PointState::Normal => 1,
            PointState::UserEdited => 2,
        }
    }

    pub fn from_bits(bits: i32) -> Self {
        if bits == 2 {
            PointState::UserEdited
        } else {
            PointState::Normal
        }
    }
}

/// Discriminant of [`Shape`], used for names and record type flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Circle,
    Ellipse,
    Path,
    Brush,
    Gradient,
    Group,
}

impl ShapeKind {
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Path => "path",
            ShapeKind::Brush => "brush",
            ShapeKind::Gradient => "gradient",
            ShapeKind::Group => "group",
        }
    }
}

/// The closed set of mask shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle(Circle),
    Ellipse(Ellipse),
    Path(Path),
    Brush(Brush),
    Gradient(Gradient),
    Group(Group),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Circle(_) => ShapeKind::Circle,
            Shape::Ellipse(_) => ShapeKind::Ellipse,
            Shape::Path(_) => ShapeKind::Path,
            Shape::Brush(_) => ShapeKind::Brush,
            Shape::Gradient(_) => ShapeKind::Gradient,
            Shape::Group(_) => ShapeKind::Group,
        }
    }

    /// Create an empty shape of the given kind, sized from `defaults` and placed at `at`.
    pub fn empty(kind: ShapeKind, at: Point, defaults: &MaskDefaults) -> Self {
        match kind {
            ShapeKind::Circle => {
                Shape::Circle(Circle::new(at, defaults.circle_size, defaults.circle_border))
            }
            ShapeKind::Ellipse => Shape::Ellipse(Ellipse {
                center: at,
                radius_a: defaults.ellipse_radius_a,
                radius_b: defaults.ellipse_radius_b,
                rotation: defaults.ellipse_rotation,
                border: defaults.ellipse_border,
                feather: defaults.ellipse_feather,
            }),
            ShapeKind::Gradient => Shape::Gradient(Gradient {
                anchor: at,
                rotation: 0.0,
                compression: defaults.gradient_compression,
                steepness: defaults.gradient_steepness,
                curvature: defaults.gradient_curvature,
                profile: defaults.gradient_profile,
            }),
            ShapeKind::Path => Shape::Path(Path::default()),
            ShapeKind::Brush => Shape::Brush(Brush::default()),
            ShapeKind::Group => Shape::Group(Group::default()),
        }
    }

    /// Number of stored points.
    pub fn point_count(&self) -> usize {
        match self {
            Shape::Circle(_) | Shape::Ellipse(_) | Shape::Gradient(_) => 1,
            Shape::Path(s) => s.points.len(),
            Shape::Brush(s) => s.points.len(),
            Shape::Group(s) => s.members.len(),
        }
    }

    /// Reference position of the shape in normalized coordinates.
    pub fn anchor(&self) -> Option<Point> {
        match self {
            Shape::Circle(s) => Some(s.center),
            Shape::Ellipse(s) => Some(s.center),
            Shape::Gradient(s) => Some(s.anchor),
            Shape::Path(s) => s.points.first().map(|p| p.corner),
            Shape::Brush(s) => s.points.first().map(|p| p.corner),
            Shape::Group(_) => None,
        }
    }

    /// Copy of the shape moved by `delta` (normalized units).
    pub fn translated(&self, delta: Vec2) -> Self {
        let mut shape = self.clone();
        match &mut shape {
            Shape::Circle(s) => s.center += delta,
            Shape::Ellipse(s) => s.center += delta,
            Shape::Gradient(s) => s.anchor += delta,
            Shape::Path(s) => s.translate(delta),
            Shape::Brush(s) => s.translate(delta),
            Shape::Group(_) => {}
        }
        shape
    }
}

/// Per-variant operations over a form. [`Form::accept`] is the only dispatch point.
pub trait ShapeVisitor {
    type Output;

    fn visit_circle(&mut self, form: &Form, circle: &Circle) -> Self::Output;
    fn visit_ellipse(&mut self, form: &Form, ellipse: &Ellipse) -> Self::Output;
    fn visit_path(&mut self, form: &Form, path: &Path) -> Self::Output;
    fn visit_brush(&mut self, form: &Form, brush: &Brush) -> Self::Output;
    fn visit_gradient(&mut self, form: &Form, gradient: &Gradient) -> Self::Output;
    fn visit_group(&mut self, form: &Form, group: &Group) -> Self::Output;
}

/// A persisted mask shape definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub(crate) id: FormId,
    /// Display name.
    pub name: String,
    /// Data version of the stored points.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Clone source position (normalized).
    #[serde(default)]
    pub source: Point,
    /// Whether this form is used for cloning (has a source).
    #[serde(default)]
    pub clone: bool,
    /// Shape data.
    pub shape: Shape,
}

impl Form {
    /// Create a form with a fresh id.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: FORMS_VERSION,
            source: Point::ZERO,
            clone: false,
            shape,
        }
    }

    /// Create an empty form of `kind` using the creation defaults.
    pub fn with_defaults(kind: ShapeKind, at: Point, defaults: &MaskDefaults) -> Self {
        Self::new(kind.name(), Shape::empty(kind, at, defaults))
    }

    /// Reconstruct a form with a specific id (for records and storage).
    pub(crate) fn reconstruct(
        id: FormId,
        name: String,
        version: u32,
        source: Point,
        clone: bool,
        shape: Shape,
    ) -> Self {
        Self {
            id,
            name,
            version,
            source,
            clone,
            shape,
        }
    }

    /// Turn this form into a clone form sampling from `source`.
    pub fn with_source(mut self, source: Point) -> Self {
        self.source = source;
        self.clone = true;
        self
    }

    pub fn id(&self) -> FormId {
        self.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.shape, Shape::Group(_))
    }

    /// Dispatch to the visitor method for this form's shape.
    pub fn accept<V: ShapeVisitor>(&self, visitor: &mut V) -> V::Output {
        match &self.shape {
            Shape::Circle(s) => visitor.visit_circle(self, s),
            Shape::Ellipse(s) => visitor.visit_ellipse(self, s),
            Shape::Path(s) => visitor.visit_path(self, s),
            Shape::Brush(s) => visitor.visit_brush(self, s),
            Shape::Gradient(s) => visitor.visit_gradient(self, s),
            Shape::Group(s) => visitor.visit_group(self, s),
        }
    }

    /// Check the point-count and range invariants of the shape.
    pub fn validate(&self) -> MaskResult<()> {
        match &self.shape {
            Shape::Circle(s) => s.validate(),
            Shape::Ellipse(s) => s.validate(),
            Shape::Path(s) => s.validate(),
            Shape::Brush(s) => s.validate(),
            Shape::Gradient(s) => s.validate(),
            Shape::Group(s) => s.validate(self.id),
        }
    }

    /// The same form with its shape moved onto the clone source.
    pub fn source_shape(&self) -> Option<Shape> {
        let anchor = self.shape.anchor()?;
        Some(self.shape.translated(self.source - anchor))
    }
}

pub(crate) fn check_border(border: f64, what: &str) -> MaskResult<()> {
    if border.is_finite() && border >= 0.0 {
        Ok(())
    } else {
        Err(MaskError::GeometryInvalid(format!("{what} border must be >= 0, got {border}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct KindName;

    impl ShapeVisitor for KindName {
        type Output = &'static str;

        fn visit_circle(&mut self, _: &Form, _: &Circle) -> &'static str {
            "circle"
        }
        fn visit_ellipse(&mut self, _: &Form, _: &Ellipse) -> &'static str {
            "ellipse"
        }
        fn visit_path(&mut self, _: &Form, _: &Path) -> &'static str {
            "path"
        }
        fn visit_brush(&mut self, _: &Form, _: &Brush) -> &'static str {
            "brush"
        }
        fn visit_gradient(&mut self, _: &Form, _: &Gradient) -> &'static str {
            "gradient"
        }
        fn visit_group(&mut self, _: &Form, _: &Group) -> &'static str {
            "group"
        }
    }

    #[test]
    fn test_new_form_has_fresh_id() {
        let a = Form::new("a", Shape::Group(Group::default()));
        let b = Form::new("b", Shape::Group(Group::default()));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.version, FORMS_VERSION);
        assert!(!a.clone);
    }

    #[test]
    fn test_accept_dispatches_by_kind() {
        let defaults = MaskDefaults::default();
        for kind in [
            ShapeKind::Circle,
            ShapeKind::Ellipse,
            ShapeKind::Path,
            ShapeKind::Brush,
            ShapeKind::Gradient,
            ShapeKind::Group,
        ] {
            let form = Form::with_defaults(kind, Point::new(0.5, 0.5), &defaults);
            assert_eq!(form.accept(&mut KindName), kind.name());
        }
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let form = Form::with_defaults(ShapeKind::Path, Point::ZERO, &MaskDefaults::default());
        assert!(matches!(form.validate(), Err(MaskError::GeometryInvalid(_))));
    }

    #[test]
    fn test_source_shape_moves_anchor() {
        let form = Form::new("c", Shape::Circle(Circle::new(Point::new(0.2, 0.3), 0.1, 0.05)))
            .with_source(Point::new(0.6, 0.7));
        assert!(form.clone);
        match form.source_shape() {
            Some(Shape::Circle(c)) => {
                assert!((c.center.x - 0.6).abs() < 1e-12);
                assert!((c.center.y - 0.7).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_form_serde() {
        let form = Form::new("c", Shape::Circle(Circle::new(Point::new(0.5, 0.5), 0.1, 0.05)));
        let json = serde_json::to_string(&form).unwrap();
        let back: Form = serde_json::from_str(&json).unwrap();
        assert_eq!(form, back);
    }
}
