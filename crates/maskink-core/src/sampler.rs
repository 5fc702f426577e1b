//! Per-shape sampling entry point.

use crate::context::MaskContext;
use crate::error::{MaskError, MaskResult};
use crate::forms::{Brush, Circle, Ellipse, Form, Gradient, Group, Path, Shape, ShapeVisitor};
use crate::geometry::ShapeGeometry;
use std::time::Instant;

/// Visitor producing the sampled geometry of a form in pipeline pixel space.
///
/// Clone forms also get their boundary sampled at the clone source.
pub struct ShapeSampler<'c, 'a> {
    ctx: &'c MaskContext<'a>,
    with_source: bool,
}

impl<'c, 'a> ShapeSampler<'c, 'a> {
    pub fn new(ctx: &'c MaskContext<'a>) -> Self {
        Self { ctx, with_source: true }
    }

    /// Skip the clone source pass.
    pub fn without_source(mut self) -> Self {
        self.with_source = false;
        self
    }

    fn finish(&self, form: &Form, result: MaskResult<ShapeGeometry>, start: Instant) -> MaskResult<ShapeGeometry> {
        let mut geometry = result?;
        log::debug!(
            "[masks {}] {} points took {:.4} sec",
            form.name,
            form.kind().name(),
            start.elapsed().as_secs_f64()
        );
        if self.with_source && form.clone {
            if let Some(shape) = form.source_shape() {
                geometry.source = sample_shape(&shape, self.ctx)?.points;
            }
        }
        Ok(geometry)
    }
}

/// Sample a bare shape, without clone source handling.
pub fn sample_shape(shape: &Shape, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
    Form::new(shape.kind().name(), shape.clone()).accept(&mut ShapeSampler::new(ctx).without_source())
}

impl ShapeVisitor for ShapeSampler<'_, '_> {
    type Output = MaskResult<ShapeGeometry>;

    fn visit_circle(&mut self, form: &Form, circle: &Circle) -> Self::Output {
        let start = Instant::now();
        self.finish(form, circle.sample(self.ctx), start)
    }

    fn visit_ellipse(&mut self, form: &Form, ellipse: &Ellipse) -> Self::Output {
        let start = Instant::now();
        self.finish(form, ellipse.sample(self.ctx), start)
    }

    fn visit_path(&mut self, form: &Form, path: &Path) -> Self::Output {
        let start = Instant::now();
        self.finish(form, path.sample(self.ctx), start)
    }

    fn visit_brush(&mut self, form: &Form, brush: &Brush) -> Self::Output {
        let start = Instant::now();
        self.finish(form, brush.sample(self.ctx), start)
    }

    fn visit_gradient(&mut self, form: &Form, gradient: &Gradient) -> Self::Output {
        let start = Instant::now();
        self.finish(form, gradient.sample(self.ctx), start)
    }

    fn visit_group(&mut self, _form: &Form, _group: &Group) -> Self::Output {
        Err(MaskError::GeometryInvalid("a group has no geometry of its own".into()))
    }
}

/// Sample any non-group form.
pub fn sample_form(form: &Form, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
    form.accept(&mut ShapeSampler::new(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AffineDistortion;
    use crate::forms::Shape;
    use kurbo::{Affine, Point};

    #[test]
    fn test_clone_source_sampled_at_source() {
        let ctx = MaskContext::new(100.0, 100.0);
        let form = Form::new("c", Shape::Circle(Circle::new(Point::new(0.3, 0.3), 0.1, 0.05)))
            .with_source(Point::new(0.7, 0.6));
        let g = sample_form(&form, &ctx).unwrap();
        assert_eq!(g.source.len(), g.points.len());
        let sb = g.source_bounds().unwrap();
        assert!((sb.center().x - 70.0).abs() < 0.5);
        assert!((sb.center().y - 60.0).abs() < 0.5);
    }

    #[test]
    fn test_plain_form_has_no_source() {
        let ctx = MaskContext::new(100.0, 100.0);
        let form = Form::new("c", Shape::Circle(Circle::new(Point::new(0.3, 0.3), 0.1, 0.05)));
        assert!(sample_form(&form, &ctx).unwrap().source.is_empty());
    }

    #[test]
    fn test_distortion_applied() {
        let shift = AffineDistortion::new(Affine::translate((10.0, 0.0)));
        let ctx = MaskContext::new(100.0, 100.0).with_distortion(&shift);
        let form = Form::new("c", Shape::Circle(Circle::new(Point::new(0.5, 0.5), 0.1, 0.05)));
        let g = sample_form(&form, &ctx).unwrap();
        assert!((g.anchor.unwrap().x - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_bare_shape_matches_form_dispatch() {
        let ctx = MaskContext::new(100.0, 100.0);
        let shape = Shape::Circle(Circle::new(Point::new(0.4, 0.5), 0.2, 0.05));
        let bare = sample_shape(&shape, &ctx).unwrap();
        let dispatched = sample_form(&Form::new("c", shape.clone()), &ctx).unwrap();
        assert_eq!(bare.points, dispatched.points);
        assert_eq!(bare.border, dispatched.border);
        assert!(bare.source.is_empty());
        assert!(sample_shape(&Shape::Group(Group::default()), &ctx).is_err());
    }

    #[test]
    fn test_group_has_no_geometry() {
        let ctx = MaskContext::new(100.0, 100.0);
        let form = Form::new("g", Shape::Group(Group::default()));
        assert!(sample_form(&form, &ctx).is_err());
    }
}
