//! Boolean compositing of group members.

use crate::buffer::{MaskBuffer, PixelBox, Roi};
use crate::raster::analytic::frame_box;
use crate::raster::try_fill_rows;
use crate::renderer::Rasterizer;
use maskink_core::error::try_zeroed;
use maskink_core::forms::Group;
use maskink_core::{CombineOp, Form, FormId, MaskContext, MaskError, MaskResult};

/// Merge one member value `child`, weighted by `opacity`, into `out`.
pub fn combine_pixel(op: CombineOp, out: f32, child: f32, opacity: f32) -> f32 {
    let c = child * opacity;
    match op {
        CombineOp::Copy => c,
        CombineOp::Union => out.max(c),
        CombineOp::Intersection => {
            if out > 0.0 && c > 0.0 {
                out.min(c)
            } else {
                0.0
            }
        }
        CombineOp::Difference => {
            if out > 0.0 && c > 0.0 {
                out * (1.0 - c)
            } else {
                out
            }
        }
        CombineOp::Exclusion => {
            if out > 0.0 && c > 0.0 {
                ((1.0 - out) * c).max(out * (1.0 - c))
            } else {
                out.max(c)
            }
        }
    }
}

/// Run `f` with `form` pushed on the group stack, failing if it is already there.
fn nested<T>(
    form: &Form,
    stack: &mut Vec<FormId>,
    f: impl FnOnce(&mut Vec<FormId>) -> MaskResult<T>,
) -> MaskResult<T> {
    if stack.contains(&form.id()) {
        return Err(MaskError::GeometryInvalid(format!(
            "group {} is nested inside itself",
            form.id()
        )));
    }
    stack.push(form.id());
    let result = f(stack);
    stack.pop();
    result
}

fn no_members(form: &Form) -> MaskError {
    MaskError::GeometryInvalid(format!("group {} has no renderable member", form.name))
}

/// `1 - mask` over the whole frame.
fn invert_over_frame(ctx: &MaskContext<'_>, mask: &MaskBuffer) -> MaskResult<MaskBuffer> {
    let frame = frame_box(ctx)?;
    let mut inverted = MaskBuffer::zeroed(frame)?;
    try_fill_rows(&mut inverted.data, frame.width, |j, row| {
        let y = frame.y + j as i64;
        for (i, v) in row.iter_mut().enumerate() {
            *v = 1.0 - mask.get(frame.x + i as i64, y);
        }
        Ok(())
    })?;
    Ok(inverted)
}

/// Combine `child` into `out` over the whole of `out`.
///
/// `Copy` only writes inside the child's own box.
fn combine_into(out: &mut MaskBuffer, child: &MaskBuffer, op: CombineOp, opacity: f32) -> MaskResult<()> {
    let (ox, oy) = (out.x, out.y);
    let footprint = child.area();
    try_fill_rows(&mut out.data, out.width, |j, row| {
        let y = oy + j as i64;
        for (i, v) in row.iter_mut().enumerate() {
            let x = ox + i as i64;
            if op == CombineOp::Copy && !footprint.contains(x, y) {
                continue;
            }
            *v = combine_pixel(op, *v, child.get(x, y), opacity);
        }
        Ok(())
    })
}

pub(crate) fn composite_full(
    raster: &Rasterizer<'_, '_>,
    form: &Form,
    group: &Group,
    stack: &mut Vec<FormId>,
) -> MaskResult<MaskBuffer> {
    nested(form, stack, |stack| {
        let mut children = Vec::new();
        for member in group.members.iter().filter(|m| m.used) {
            let mask = raster
                .member_form(member.form_id)
                .and_then(|child| raster.full(child, stack))
                .and_then(|mask| {
                    if member.inverse { invert_over_frame(raster.ctx, &mask) } else { Ok(mask) }
                });
            match mask {
                Ok(mask) => children.push((member, mask)),
                Err(e) => log::warn!("[masks {}] skipping member {}: {e}", form.name, member.form_id),
            }
        }

        let area = children
            .iter()
            .map(|(_, mask)| mask.area())
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| no_members(form))?;
        let mut out = MaskBuffer::zeroed(area)?;
        for (member, mask) in &children {
            combine_into(&mut out, mask, member.combine, member.opacity as f32)?;
        }
        Ok(out)
    })
}

/// Member footprint in full-frame pixels; an inverted member covers the frame.
fn member_footprint(
    raster: &Rasterizer<'_, '_>,
    child: &Form,
    inverse: bool,
    source: bool,
    stack: &mut Vec<FormId>,
) -> MaskResult<PixelBox> {
    let own = raster.footprint(child, source, stack)?;
    if inverse { frame_box(raster.ctx) } else { Ok(own) }
}

/// Range of ROI columns (or rows) whose frame position lies in `[start, end)`.
fn roi_span(offset: i64, len: usize, scale: f64, start: i64, end: i64) -> (usize, usize) {
    let first = (start as f64 * scale).ceil() as i64 - offset;
    let last = (end as f64 * scale).ceil() as i64 - offset;
    (first.clamp(0, len as i64) as usize, last.clamp(0, len as i64) as usize)
}

/// Combine one member's ROI samples into `out`.
///
/// `Copy` only writes where the member's footprint covers the ROI pixel.
fn combine_roi(
    out: &mut [f32],
    child: &[f32],
    roi: &Roi,
    footprint: Option<PixelBox>,
    op: CombineOp,
    opacity: f32,
) -> MaskResult<()> {
    let (cols, rows) = match footprint {
        Some(b) if op == CombineOp::Copy => (
            roi_span(roi.x, roi.width, roi.scale, b.x, b.right()),
            roi_span(roi.y, roi.height, roi.scale, b.y, b.bottom()),
        ),
        _ => ((0, roi.width), (0, roi.height)),
    };
    try_fill_rows(out, roi.width, |j, row| {
        if j < rows.0 || j >= rows.1 {
            return Ok(());
        }
        let base = j * roi.width;
        let samples = &child[base + cols.0..base + cols.1];
        for (v, &c) in row[cols.0..cols.1].iter_mut().zip(samples) {
            *v = combine_pixel(op, *v, c, opacity);
        }
        Ok(())
    })
}

pub(crate) fn composite_roi(
    raster: &Rasterizer<'_, '_>,
    form: &Form,
    group: &Group,
    roi: &Roi,
    out: &mut [f32],
    stack: &mut Vec<FormId>,
) -> MaskResult<()> {
    nested(form, stack, |stack| {
        let mut scratch = try_zeroed(out.len(), "group member roi")?;
        let mut combined = 0;
        for member in group.members.iter().filter(|m| m.used) {
            scratch.fill(0.0);
            let result = raster.member_form(member.form_id).and_then(|child| {
                let footprint = if member.combine == CombineOp::Copy {
                    Some(member_footprint(raster, child, member.inverse, false, stack)?)
                } else {
                    None
                };
                raster.roi(child, roi, &mut scratch, stack)?;
                Ok(footprint)
            });
            let footprint = match result {
                Ok(footprint) => footprint,
                Err(e) => {
                    log::warn!("[masks {}] skipping member {}: {e}", form.name, member.form_id);
                    continue;
                }
            };
            if member.inverse {
                scratch.iter_mut().for_each(|v| *v = 1.0 - *v);
            }
            combine_roi(out, &scratch, roi, footprint, member.combine, member.opacity as f32)?;
            combined += 1;
        }
        if combined == 0 {
            return Err(no_members(form));
        }
        Ok(())
    })
}

/// Union of the member boxes; an inverted member covers the frame.
pub(crate) fn group_area(
    raster: &Rasterizer<'_, '_>,
    form: &Form,
    group: &Group,
    source: bool,
    stack: &mut Vec<FormId>,
) -> MaskResult<PixelBox> {
    nested(form, stack, |stack| {
        let mut area: Option<PixelBox> = None;
        for member in group.members.iter().filter(|m| m.used) {
            let member_box = raster
                .member_form(member.form_id)
                .and_then(|child| member_footprint(raster, child, member.inverse, source, stack));
            match member_box {
                Ok(b) => area = Some(area.map_or(b, |a| a.union(&b))),
                Err(e) => log::warn!("[masks {}] skipping member {}: {e}", form.name, member.form_id),
            }
        }
        area.ok_or_else(|| no_members(form))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(x: i64, y: i64, width: usize, height: usize, value: f32) -> MaskBuffer {
        MaskBuffer {
            data: vec![value; width * height],
            width,
            height,
            x,
            y,
        }
    }

    #[test]
    fn test_combine_pixel_operators() {
        assert_eq!(combine_pixel(CombineOp::Copy, 0.9, 0.5, 0.5), 0.25);
        assert_eq!(combine_pixel(CombineOp::Union, 0.3, 0.5, 1.0), 0.5);
        assert_eq!(combine_pixel(CombineOp::Union, 0.8, 0.5, 1.0), 0.8);
        assert_eq!(combine_pixel(CombineOp::Intersection, 0.8, 0.5, 1.0), 0.5);
        assert_eq!(combine_pixel(CombineOp::Intersection, 0.8, 0.0, 1.0), 0.0);
        assert_eq!(combine_pixel(CombineOp::Intersection, 0.0, 0.7, 1.0), 0.0);
        assert!((combine_pixel(CombineOp::Difference, 0.8, 0.5, 1.0) - 0.4).abs() < 1e-6);
        assert_eq!(combine_pixel(CombineOp::Difference, 0.8, 0.0, 1.0), 0.8);
        assert!((combine_pixel(CombineOp::Exclusion, 0.5, 1.0, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(combine_pixel(CombineOp::Exclusion, 1.0, 1.0, 1.0), 0.0);
        assert_eq!(combine_pixel(CombineOp::Exclusion, 0.0, 0.6, 1.0), 0.6);
    }

    #[test]
    fn test_copy_keeps_values_outside_child_box() {
        let mut out = buffer(0, 0, 4, 1, 0.7);
        let child = buffer(2, 0, 2, 1, 0.2);
        combine_into(&mut out, &child, CombineOp::Copy, 1.0).unwrap();
        assert_eq!(out.data, vec![0.7, 0.7, 0.2, 0.2]);
    }

    #[test]
    fn test_intersection_clears_outside_child_box() {
        let mut out = buffer(0, 0, 4, 1, 0.7);
        let child = buffer(2, 0, 2, 1, 0.2);
        combine_into(&mut out, &child, CombineOp::Intersection, 1.0).unwrap();
        assert_eq!(out.data, vec![0.0, 0.0, 0.2, 0.2]);
    }

    #[test]
    fn test_roi_copy_limited_to_footprint() {
        let roi = Roi::new(0, 0, 4, 1, 1.0);
        let mut out = vec![0.7; 4];
        let child = vec![0.2; 4];
        let footprint = PixelBox::new(2, 0, 2, 1);
        combine_roi(&mut out, &child, &roi, Some(footprint), CombineOp::Copy, 1.0).unwrap();
        assert_eq!(out, vec![0.7, 0.7, 0.2, 0.2]);
    }

    #[test]
    fn test_roi_span_follows_scale() {
        // frame pixels [10, 20) at half scale land on ROI pixels [5, 10)
        assert_eq!(roi_span(0, 40, 0.5, 10, 20), (5, 10));
        assert_eq!(roi_span(6, 40, 0.5, 10, 20), (0, 4));
        assert_eq!(roi_span(0, 4, 1.0, 10, 20), (4, 4));
    }

    #[test]
    fn test_invert_over_frame() {
        let ctx = MaskContext::new(4.0, 2.0);
        let mask = buffer(1, 0, 2, 1, 1.0);
        let inverted = invert_over_frame(&ctx, &mask).unwrap();
        assert_eq!(inverted.area(), PixelBox::new(0, 0, 4, 2));
        assert_eq!(inverted.data, vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_nested_rejects_reentry() {
        let form = Form::new("g", maskink_core::Shape::Group(Group::default()));
        let mut stack = vec![form.id()];
        let result = nested(&form, &mut stack, |_| Ok(()));
        assert!(matches!(result, Err(MaskError::GeometryInvalid(_))));
        assert_eq!(stack.len(), 1);
    }
}
