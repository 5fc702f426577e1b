//! Closed bezier path form.
//!
//! Corners are joined by cubic segments. Control points of smooth corners
//! follow a closed Catmull-Rom spline through the corners; corners marked as
//! user edited keep their stored controls, or become sharp when none are
//! stored. The feather border is the offset of every segment by the corner
//! border widths, signed so it always lies outside for either winding.

use super::{PointState, check_border};
use crate::context::MaskContext;
use crate::error::{MaskError, MaskResult};
use crate::flatten::{Flattener, Node, OffsetSegment, SampleBuffer, catmull_to_bezier, gap_arc, is_clockwise};
use crate::geometry::{Payload, ShapeGeometry};
use crate::intersect::{apply_skips, find_self_intersections};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Parameter at which the start of the next segment is probed for border gaps.
const GAP_PROBE_T: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub corner: Point,
    /// Incoming control point; `None` is derived from the neighbours.
    #[serde(default)]
    pub ctrl1: Option<Point>,
    /// Outgoing control point.
    #[serde(default)]
    pub ctrl2: Option<Point>,
    /// Feather width before and after the corner.
    pub border: [f64; 2],
    #[serde(default)]
    pub state: PointState,
}

impl PathPoint {
    pub fn new(corner: Point, border: f64) -> Self {
        Self {
            corner,
            ctrl1: None,
            ctrl2: None,
            border: [border, border],
            state: PointState::Normal,
        }
    }

    /// A sharp corner with both controls on the corner itself.
    pub fn sharp(corner: Point, border: f64) -> Self {
        Self {
            state: PointState::UserEdited,
            ..Self::new(corner, border)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub points: Vec<PathPoint>,
}

impl Path {
    pub fn new(points: Vec<PathPoint>) -> Self {
        Self { points }
    }

    pub fn validate(&self) -> MaskResult<()> {
        if self.points.len() < 2 {
            return Err(MaskError::GeometryInvalid(format!(
                "path needs at least 2 points, got {}",
                self.points.len()
            )));
        }
        for p in &self.points {
            check_border(p.border[0], "path")?;
            check_border(p.border[1], "path")?;
        }
        Ok(())
    }

    pub fn translate(&mut self, delta: Vec2) {
        for p in &mut self.points {
            p.corner += delta;
            p.ctrl1 = p.ctrl1.map(|c| c + delta);
            p.ctrl2 = p.ctrl2.map(|c| c + delta);
        }
    }

    pub fn is_clockwise(&self) -> bool {
        let corners: Vec<Point> = self.points.iter().map(|p| p.corner).collect();
        is_clockwise(&corners)
    }

    /// Incoming and outgoing control point of every corner.
    pub fn resolved_controls(&self) -> Vec<(Point, Point)> {
        let nb = self.points.len();
        let corner = |i: isize| self.points[i.rem_euclid(nb as isize) as usize].corner;
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| match p.state {
                PointState::Normal => {
                    let i = i as isize;
                    let (_, c1) = catmull_to_bezier(corner(i - 2), corner(i - 1), corner(i), corner(i + 1));
                    let (c2, _) = catmull_to_bezier(corner(i - 1), corner(i), corner(i + 1), corner(i + 2));
                    (c1, c2)
                }
                PointState::UserEdited => (p.ctrl1.unwrap_or(p.corner), p.ctrl2.unwrap_or(p.corner)),
            })
            .collect()
    }

    /// Sample the path outline and its feather border in pipeline pixel space.
    pub fn sample(&self, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
        ctx.ensure_valid()?;
        self.validate()?;
        let nb = self.points.len();
        let m = ctx.min_dim();
        let clockwise = self.is_clockwise();
        let sign = if clockwise { 1.0 } else { -1.0 };

        let corners: Vec<Point> = self.points.iter().map(|p| ctx.to_pixels(p.corner)).collect();
        let ctrls: Vec<(Point, Point)> = self
            .resolved_controls()
            .into_iter()
            .map(|(a, b)| (ctx.to_pixels(a), ctx.to_pixels(b)))
            .collect();
        let outgoing = |k: usize| Node::new(corners[k], ctrls[k].1, sign * self.points[k].border[1] * m);
        let incoming = |k: usize| Node::new(corners[k], ctrls[k].0, sign * self.points[k].border[0] * m);

        let flattener = Flattener::new();
        let mut buf = SampleBuffer::new();
        for k in 0..nb {
            let k1 = (k + 1) % nb;
            let seg = OffsetSegment::new(&outgoing(k), &incoming(k1));
            let end = flattener.flatten(&seg, &mut buf);
            let end_border = end.border.or_else(|| buf.last_border());
            buf.push(end.point, end_border, Payload::default());

            if nb >= 3 {
                let next = OffsetSegment::new(&outgoing(k1), &incoming((k + 2) % nb));
                if let (Some(bmax), Some(rb)) = (next.sample(GAP_PROBE_T).border, end_border) {
                    if (bmax.x - rb.x).abs() > 1.0 || (bmax.y - rb.y).abs() > 1.0 {
                        gap_arc(end.point, rb, bmax, clockwise, &mut buf, Payload::default());
                    }
                }
            }
        }
        let (mut points, mut border, _) = buf.finish();

        let intervals = if nb >= 3 {
            match find_self_intersections(&border, nb) {
                Ok(intervals) => intervals,
                Err(MaskError::SelfIntersectionGridTooSmall { width, height }) => {
                    log::debug!("[masks path] self-intersection grid {width}x{height} too small, skipped");
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        let mut controls: Vec<Point> = ctrls
            .iter()
            .zip(&corners)
            .flat_map(|(c, p)| [c.0, *p, c.1])
            .collect();
        ctx.forward(&mut controls, "path controls")?;
        ctx.forward(&mut points, "path")?;
        ctx.forward(&mut border, "path border")?;

        Ok(ShapeGeometry {
            anchor: controls.get(1).copied(),
            controls,
            points,
            border: apply_skips(border, &intervals),
            ..Default::default()
        })
    }
}
