//! Rasterizer trait and the default implementation.

use crate::buffer::{MaskBuffer, PixelBox, Roi};
use crate::compositor;
use crate::raster::analytic::{
    self, Falloff, GRADIENT_MESH_STEP, frame_box, outline_box, roi_mesh_step,
};
use crate::raster::polygon::fill_interior;
use crate::raster::strip::draw_strips;
use crate::raster::{Grid, GridMap};
use crate::{RasterError, RasterResult};
use kurbo::Vec2;
use maskink_core::error::try_zeroed;
use maskink_core::forms::{Brush, Circle, Ellipse, Gradient, Group, Path};
use maskink_core::{
    Form, FormId, MaskContext, MaskDocument, MaskError, MaskResult, ShapeGeometry, ShapeSampler, ShapeVisitor,
};
use std::time::Instant;

/// Padding around the sampled bounds of paths and brushes, in pixels.
const STRIP_PAD: i64 = 2;

/// Turns forms into opacity masks.
pub trait MaskRenderer {
    /// Rasterize `form` over its own bounding box at full resolution.
    fn render(&self, form: &Form) -> RasterResult<MaskBuffer>;

    /// Rasterize `form` into `out`, which covers `roi` row by row.
    ///
    /// On failure `out` is left untouched.
    fn render_roi(&self, form: &Form, roi: &Roi, out: &mut [f32]) -> RasterResult<()>;

    /// Pixel box the full-frame mask of `form` covers.
    fn area(&self, form: &Form) -> RasterResult<PixelBox>;

    /// Pixel box of the clone source of `form`.
    fn source_area(&self, form: &Form) -> RasterResult<PixelBox>;
}

/// Rasterizer over one frame, resolving group members through a document.
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer<'c, 'a> {
    pub(crate) ctx: &'c MaskContext<'a>,
    pub(crate) document: Option<&'c MaskDocument>,
}

impl<'c, 'a> Rasterizer<'c, 'a> {
    pub fn new(ctx: &'c MaskContext<'a>) -> Self {
        Self { ctx, document: None }
    }

    /// Set the document used to look up group members.
    pub fn with_document(mut self, document: &'c MaskDocument) -> Self {
        self.document = Some(document);
        self
    }

    /// Look up the form a group member refers to.
    pub(crate) fn member_form(&self, form_id: FormId) -> MaskResult<&'c Form> {
        self.document
            .and_then(|doc| doc.get_form(form_id))
            .ok_or(MaskError::FormNotFound(form_id))
    }

    pub(crate) fn full(&self, form: &Form, stack: &mut Vec<FormId>) -> MaskResult<MaskBuffer> {
        let start = Instant::now();
        self.ctx.ensure_valid()?;
        form.validate()?;
        let buffer = form.accept(&mut FullFrame { raster: self, stack })?;
        log::debug!(
            "[masks {}] {} mask took {:.4} sec",
            form.name,
            form.kind().name(),
            start.elapsed().as_secs_f64()
        );
        Ok(buffer)
    }

    /// Rasterize into a zeroed `out` of `roi.len()` values.
    pub(crate) fn roi(&self, form: &Form, roi: &Roi, out: &mut [f32], stack: &mut Vec<FormId>) -> MaskResult<()> {
        let start = Instant::now();
        self.ctx.ensure_valid()?;
        form.validate()?;
        form.accept(&mut RoiFill {
            raster: self,
            roi,
            out,
            stack,
        })?;
        log::debug!(
            "[masks {}] {} roi took {:.4} sec",
            form.name,
            form.kind().name(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    pub(crate) fn footprint(&self, form: &Form, source: bool, stack: &mut Vec<FormId>) -> MaskResult<PixelBox> {
        self.ctx.ensure_valid()?;
        form.validate()?;
        if source && !form.is_group() {
            if let Some(shape) = form.source_shape() {
                let moved = Form::new(form.name.clone(), shape);
                return moved.accept(&mut Footprint {
                    raster: self,
                    source: false,
                    stack,
                });
            }
        }
        form.accept(&mut Footprint {
            raster: self,
            source,
            stack,
        })
    }

    fn sampled(&self, form: &Form) -> MaskResult<ShapeGeometry> {
        form.accept(&mut ShapeSampler::new(self.ctx).without_source())
    }
}

impl MaskRenderer for Rasterizer<'_, '_> {
    fn render(&self, form: &Form) -> RasterResult<MaskBuffer> {
        Ok(self.full(form, &mut Vec::new())?)
    }

    fn render_roi(&self, form: &Form, roi: &Roi, out: &mut [f32]) -> RasterResult<()> {
        if out.len() != roi.len() {
            return Err(RasterError::BufferSize {
                expected: roi.len(),
                actual: out.len(),
            });
        }
        if !(roi.scale.is_finite() && roi.scale > 0.0) {
            return Err(MaskError::GeometryInvalid(format!("invalid roi scale {}", roi.scale)).into());
        }
        if roi.is_empty() {
            return Ok(());
        }
        let mut scratch = try_zeroed(roi.len(), "roi mask")?;
        self.roi(form, roi, &mut scratch, &mut Vec::new())?;
        out.copy_from_slice(&scratch);
        Ok(())
    }

    fn area(&self, form: &Form) -> RasterResult<PixelBox> {
        Ok(self.footprint(form, false, &mut Vec::new())?)
    }

    fn source_area(&self, form: &Form) -> RasterResult<PixelBox> {
        Ok(self.footprint(form, true, &mut Vec::new())?)
    }
}

fn sampled_box(geometry: &ShapeGeometry) -> MaskResult<PixelBox> {
    let rect = geometry
        .bounds()
        .ok_or_else(|| MaskError::GeometryInvalid("sampled shape has no points".into()))?;
    Ok(PixelBox::enclosing(rect, STRIP_PAD))
}

/// Fill the interior (paths) and stamp the falloff strips of a sampled shape.
fn draw_sampled(grid: &mut Grid<'_>, geometry: &ShapeGeometry, map: GridMap, brush: bool) -> MaskResult<()> {
    let points: Vec<_> = geometry.points.iter().map(|&p| map.map(p)).collect();
    let targets: Vec<_> = geometry
        .falloff_targets()
        .into_iter()
        .map(|t| t.map(|p| map.map(p)))
        .collect();
    if brush {
        draw_strips(grid, &points, &targets, Some(geometry.payload.as_slice()));
    } else {
        fill_interior(grid, &points)?;
        draw_strips(grid, &points, &targets, None);
    }
    Ok(())
}

fn render_sampled(geometry: &ShapeGeometry, brush: bool) -> MaskResult<MaskBuffer> {
    let area = sampled_box(geometry)?;
    let mut buffer = MaskBuffer::zeroed(area)?;
    let map = GridMap::new(Vec2::new(area.x as f64, area.y as f64), 1.0);
    let mut grid = Grid::new(&mut buffer.data, area.width, area.height);
    draw_sampled(&mut grid, geometry, map, brush)?;
    Ok(buffer)
}

struct FullFrame<'r, 'c, 'a> {
    raster: &'r Rasterizer<'c, 'a>,
    stack: &'r mut Vec<FormId>,
}

impl ShapeVisitor for FullFrame<'_, '_, '_> {
    type Output = MaskResult<MaskBuffer>;

    fn visit_circle(&mut self, _form: &Form, circle: &Circle) -> Self::Output {
        let ctx = self.raster.ctx;
        let area = outline_box(ctx, circle.outline(ctx))?;
        analytic::render_full(ctx, area, 1, Falloff::Circle(circle.falloff(ctx)))
    }

    fn visit_ellipse(&mut self, _form: &Form, ellipse: &Ellipse) -> Self::Output {
        let ctx = self.raster.ctx;
        let area = outline_box(ctx, ellipse.outline(ctx))?;
        analytic::render_full(ctx, area, 1, Falloff::Ellipse(ellipse.falloff(ctx)))
    }

    fn visit_path(&mut self, form: &Form, _path: &Path) -> Self::Output {
        render_sampled(&self.raster.sampled(form)?, false)
    }

    fn visit_brush(&mut self, form: &Form, _brush: &Brush) -> Self::Output {
        render_sampled(&self.raster.sampled(form)?, true)
    }

    fn visit_gradient(&mut self, _form: &Form, gradient: &Gradient) -> Self::Output {
        let ctx = self.raster.ctx;
        let area = frame_box(ctx)?;
        analytic::render_full(ctx, area, GRADIENT_MESH_STEP, Falloff::Gradient(gradient.field(ctx)))
    }

    fn visit_group(&mut self, form: &Form, group: &Group) -> Self::Output {
        compositor::composite_full(self.raster, form, group, self.stack)
    }
}

struct RoiFill<'r, 'c, 'a> {
    raster: &'r Rasterizer<'c, 'a>,
    roi: &'r Roi,
    out: &'r mut [f32],
    stack: &'r mut Vec<FormId>,
}

impl RoiFill<'_, '_, '_> {
    fn sampled(&mut self, form: &Form, brush: bool) -> MaskResult<()> {
        let geometry = self.raster.sampled(form)?;
        let map = GridMap::new(Vec2::new(self.roi.x as f64, self.roi.y as f64), self.roi.scale);
        let mut grid = Grid::new(&mut *self.out, self.roi.width, self.roi.height);
        draw_sampled(&mut grid, &geometry, map, brush)
    }
}

impl ShapeVisitor for RoiFill<'_, '_, '_> {
    type Output = MaskResult<()>;

    fn visit_circle(&mut self, _form: &Form, circle: &Circle) -> Self::Output {
        let ctx = self.raster.ctx;
        analytic::render_roi(ctx, self.roi, 1, Falloff::Circle(circle.falloff(ctx)), self.out)
    }

    fn visit_ellipse(&mut self, _form: &Form, ellipse: &Ellipse) -> Self::Output {
        let ctx = self.raster.ctx;
        let step = roi_mesh_step(self.roi.scale);
        analytic::render_roi(ctx, self.roi, step, Falloff::Ellipse(ellipse.falloff(ctx)), self.out)
    }

    fn visit_path(&mut self, form: &Form, _path: &Path) -> Self::Output {
        self.sampled(form, false)
    }

    fn visit_brush(&mut self, form: &Form, _brush: &Brush) -> Self::Output {
        self.sampled(form, true)
    }

    fn visit_gradient(&mut self, _form: &Form, gradient: &Gradient) -> Self::Output {
        let ctx = self.raster.ctx;
        let step = roi_mesh_step(self.roi.scale);
        analytic::render_roi(ctx, self.roi, step, Falloff::Gradient(gradient.field(ctx)), self.out)
    }

    fn visit_group(&mut self, form: &Form, group: &Group) -> Self::Output {
        compositor::composite_roi(self.raster, form, group, self.roi, self.out, self.stack)
    }
}

struct Footprint<'r, 'c, 'a> {
    raster: &'r Rasterizer<'c, 'a>,
    source: bool,
    stack: &'r mut Vec<FormId>,
}

impl ShapeVisitor for Footprint<'_, '_, '_> {
    type Output = MaskResult<PixelBox>;

    fn visit_circle(&mut self, _form: &Form, circle: &Circle) -> Self::Output {
        outline_box(self.raster.ctx, circle.outline(self.raster.ctx))
    }

    fn visit_ellipse(&mut self, _form: &Form, ellipse: &Ellipse) -> Self::Output {
        outline_box(self.raster.ctx, ellipse.outline(self.raster.ctx))
    }

    fn visit_path(&mut self, form: &Form, _path: &Path) -> Self::Output {
        sampled_box(&self.raster.sampled(form)?)
    }

    fn visit_brush(&mut self, form: &Form, _brush: &Brush) -> Self::Output {
        sampled_box(&self.raster.sampled(form)?)
    }

    fn visit_gradient(&mut self, _form: &Form, _gradient: &Gradient) -> Self::Output {
        frame_box(self.raster.ctx)
    }

    fn visit_group(&mut self, form: &Form, group: &Group) -> Self::Output {
        compositor::group_area(self.raster, form, group, self.source, self.stack)
    }
}
