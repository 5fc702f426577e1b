//! Circle, ellipse and gradient masks from their closed-form falloff.

use super::mesh;
use crate::buffer::{MaskBuffer, PixelBox, Roi};
use kurbo::Point;
use maskink_core::forms::{CircleFalloff, EllipseFalloff, GradientField};
use maskink_core::geometry::bounds_of;
use maskink_core::{MaskContext, MaskError, MaskResult};

/// Mesh step of full-frame gradients.
pub(crate) const GRADIENT_MESH_STEP: usize = 8;

/// Mesh step for ROI rendering at `scale`, between 1 and 4 pixels.
pub(crate) fn roi_mesh_step(scale: f64) -> usize {
    (((10.0 * scale + 2.0) / 3.0) as usize).clamp(1, 4)
}

/// Falloff of one analytic shape, in shape-local pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Falloff {
    Circle(CircleFalloff),
    Ellipse(EllipseFalloff),
    Gradient(GradientField),
}

impl Falloff {
    pub fn value(&self, p: Point) -> f32 {
        match self {
            Falloff::Circle(f) => f.value(p),
            Falloff::Ellipse(f) => f.value(p),
            Falloff::Gradient(f) => f.value(p),
        }
    }
}

/// Pixel box of a forward-transformed outline.
pub(crate) fn outline_box(ctx: &MaskContext<'_>, mut outline: Vec<Point>) -> MaskResult<PixelBox> {
    ctx.forward(&mut outline, "outline")?;
    let rect = bounds_of(outline)
        .ok_or_else(|| MaskError::GeometryInvalid("outline has no finite points".into()))?;
    Ok(PixelBox::enclosing(rect, 0))
}

/// Pixel box of the whole frame after the forward transform.
pub(crate) fn frame_box(ctx: &MaskContext<'_>) -> MaskResult<PixelBox> {
    let (w, h) = (ctx.width - 1.0, ctx.height - 1.0);
    outline_box(
        ctx,
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(0.0, h),
            Point::new(w, h),
        ],
    )
}

/// Evaluate the falloff over `area`.
pub(crate) fn render_full(
    ctx: &MaskContext<'_>,
    area: PixelBox,
    step: usize,
    falloff: Falloff,
) -> MaskResult<MaskBuffer> {
    let mut buffer = MaskBuffer::zeroed(area)?;
    let (ox, oy) = (area.x as f64, area.y as f64);
    mesh::evaluate(
        ctx,
        &mut buffer.data,
        area.width,
        area.height,
        step,
        |x, y| Point::new(x + ox, y + oy),
        |p| falloff.value(p),
    )?;
    Ok(buffer)
}

/// Evaluate the falloff at every ROI pixel into `out`.
pub(crate) fn render_roi(
    ctx: &MaskContext<'_>,
    roi: &Roi,
    step: usize,
    falloff: Falloff,
    out: &mut [f32],
) -> MaskResult<()> {
    let roi = *roi;
    mesh::evaluate(
        ctx,
        out,
        roi.width,
        roi.height,
        step,
        |x, y| roi.frame_point(x, y),
        |p| falloff.value(p),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use maskink_core::forms::Circle;

    #[test]
    fn test_roi_mesh_step_range() {
        assert_eq!(roi_mesh_step(0.1), 1);
        assert_eq!(roi_mesh_step(0.5), 2);
        assert_eq!(roi_mesh_step(1.0), 4);
        assert_eq!(roi_mesh_step(4.0), 4);
    }

    #[test]
    fn test_frame_box_identity() {
        let ctx = MaskContext::new(120.0, 80.0);
        let b = frame_box(&ctx).unwrap();
        assert_eq!((b.x, b.y), (0, 0));
        assert_eq!(b.right(), 120);
        assert_eq!(b.bottom(), 80);
    }

    #[test]
    fn test_circle_full_frame_values() {
        let ctx = MaskContext::new(100.0, 100.0);
        let circle = Circle::new(Point::new(0.5, 0.5), 0.2, 0.05);
        let area = outline_box(&ctx, circle.outline(&ctx)).unwrap();
        let mask = render_full(&ctx, area, 1, Falloff::Circle(circle.falloff(&ctx))).unwrap();
        assert_eq!(mask.get(50, 50), 1.0);
        assert_eq!(mask.get(50, 69), 1.0);
        let mid = mask.get(72, 50);
        assert!(mid > 0.0 && mid < 1.0);
        assert_eq!(mask.get(50, 76), 0.0);
    }
}
