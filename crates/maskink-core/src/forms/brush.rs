//! Open brush stroke form.
//!
//! A stroke is traversed twice, corner 0 to the last corner and back, with
//! the feather on the right of travel each way. The two passes join into one
//! closed outline; stroke ends are capped with half circles. Every sample
//! carries the interpolated hardness and density of its segment.

use super::{PointState, check_border};
use crate::context::MaskContext;
use crate::error::{MaskError, MaskResult};
use crate::flatten::{Flattener, Node, OffsetSegment, SampleBuffer, catmull_to_bezier, gap_arc, stamp};
use crate::geometry::{Coord, Payload, ShapeGeometry};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Hardness or density change between corners that is drawn as a stamp.
const PAYLOAD_JUMP: f64 = 0.05;
/// Width change between corners that is drawn as a half-circle junction.
const WIDTH_JUMP: f64 = 1e-4;

fn default_hardness() -> f64 {
    0.66
}

fn default_density() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrushPoint {
    pub corner: Point,
    #[serde(default)]
    pub ctrl1: Option<Point>,
    #[serde(default)]
    pub ctrl2: Option<Point>,
    /// Stroke half-width on each side.
    pub border: [f64; 2],
    #[serde(default = "default_hardness")]
    pub hardness: f64,
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default)]
    pub state: PointState,
}

impl BrushPoint {
    pub fn new(corner: Point, border: f64, hardness: f64, density: f64) -> Self {
        Self {
            corner,
            ctrl1: None,
            ctrl2: None,
            border: [border, border],
            hardness,
            density,
            state: PointState::Normal,
        }
    }

    pub fn payload(&self) -> Payload {
        Payload::new(self.hardness, self.density)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    pub points: Vec<BrushPoint>,
}

/// Index of the `n`-th corner visited when walking 0..nb-1 and back,
/// visiting both ends twice.
pub(crate) fn cyclic_cursor(n: usize, nb: usize) -> usize {
    let o = n % (2 * nb);
    let p = o % nb;
    if o <= p { o } else { o - 2 * p - 1 }
}

impl Brush {
    pub fn new(points: Vec<BrushPoint>) -> Self {
        Self { points }
    }

    pub fn validate(&self) -> MaskResult<()> {
        if self.points.len() < 2 {
            return Err(MaskError::GeometryInvalid(format!(
                "brush needs at least 2 points, got {}",
                self.points.len()
            )));
        }
        for p in &self.points {
            check_border(p.border[0], "brush")?;
            check_border(p.border[1], "brush")?;
            if !(0.0..=1.0).contains(&p.hardness) || !(0.0..=1.0).contains(&p.density) {
                return Err(MaskError::GeometryInvalid(format!(
                    "brush hardness and density must lie in [0, 1], got {} and {}",
                    p.hardness, p.density
                )));
            }
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

    /// Incoming and outgoing control point of every corner. Missing
    /// neighbours at the stroke ends are mirrored through the end corner.
    pub fn resolved_controls(&self) -> Vec<(Point, Point)> {
        let nb = self.points.len();
        let c = |i: usize| self.points[i].corner;
        let mirror = |about: Point, p: Point| about + (about - p);
        (0..nb)
            .map(|i| {
                let pt = &self.points[i];
                if pt.state == PointState::UserEdited || nb < 2 {
                    return (pt.ctrl1.unwrap_or(pt.corner), pt.ctrl2.unwrap_or(pt.corner));
                }
                let p3 = c(i);
                let (p1, p2) = match i {
                    0 => {
                        let m = mirror(p3, c(1));
                        (m, m)
                    }
                    1 => (mirror(c(0), p3), c(0)),
                    _ => (c(i - 2), c(i - 1)),
                };
                let (p4, p5) = if i + 1 >= nb {
                    let m = mirror(p3, c(i - 1));
                    (m, m)
                } else if i + 2 >= nb {
                    (c(i + 1), mirror(c(i + 1), p3))
                } else {
                    (c(i + 1), c(i + 2))
                };
                let (_, ctrl1) = catmull_to_bezier(p1, p2, p3, p4);
                let (ctrl2, _) = catmull_to_bezier(p2, p3, p4, p5);
                (ctrl1, ctrl2)
            })
            .collect()
    }

    /// Sample the stroke outline, its feather border and per-sample payload.
    pub fn sample(&self, ctx: &MaskContext<'_>) -> MaskResult<ShapeGeometry> {
        ctx.ensure_valid()?;
        self.validate()?;
        let nb = self.points.len();
        let m = ctx.min_dim();

        let corners: Vec<Point> = self.points.iter().map(|p| ctx.to_pixels(p.corner)).collect();
        let ctrls: Vec<(Point, Point)> = self
            .resolved_controls()
            .into_iter()
            .map(|(a, b)| (ctx.to_pixels(a), ctx.to_pixels(b)))
            .collect();

        let flattener = Flattener::with_small_gaps();
        let mut buf = SampleBuffer::new();
        let mut forward = true;
        let mut start_stamp = false;

        for n in 0..2 * nb {
            let k = cyclic_cursor(n, nb);
            let k1 = cyclic_cursor(n + 1, nb);
            let k2 = cyclic_cursor(n + 2, nb);

            // Travelling backwards swaps the roles of the two controls.
            let node = |k: usize, outgoing: bool, side: usize| {
                let ctrl = if outgoing == forward { ctrls[k].1 } else { ctrls[k].0 };
                let pt = &self.points[k];
                Node::new(corners[k], ctrl, pt.border[side] * m).with_payload(pt.payload())
            };
            let p1 = node(k, true, 1);
            let p2 = node(k1, false, 0);

            let payload_jump = (p1.payload.hardness - p2.payload.hardness).abs() > PAYLOAD_JUMP
                || (p1.payload.density - p2.payload.density).abs() > PAYLOAD_JUMP;
            if payload_jump || (start_stamp && n == 2 * nb - 1) {
                if n == 0 {
                    // The first corner is stamped once the outline comes back to it.
                    start_stamp = true;
                } else if let (Some(c), Some(b)) = (buf.last_point(), buf.last_border()) {
                    stamp(c, b, &mut buf, p1.payload);
                }
            }

            if (p1.radius - p2.radius).abs() > WIDTH_JUMP && n > 0 {
                if let (Some(c), Some(b)) = (buf.last_point(), buf.last_border()) {
                    gap_arc(c, b, c + (c - b), true, &mut buf, p1.payload);
                }
            }

            if k == k1 {
                // End of the stroke: cap it and turn around.
                if let (Some(c), Some(b)) = (buf.last_point(), buf.last_border()) {
                    gap_arc(c, b, c + (c - b), true, &mut buf, p1.payload);
                }
                forward = !forward;
                continue;
            }

            let seg = OffsetSegment::new(&p1, &p2);
            let end = flattener.flatten(&seg, &mut buf);
            let end_payload = seg.payload_at(1.0);
            let end_border = end.border.or_else(|| buf.last_border());
            buf.push(end.point, end_border, end_payload);

            if nb >= 3 {
                let next = OffsetSegment::new(&node(k1, true, 1), &node(k2, false, 0));
                let bmax = next.sample(0.0).border.or_else(|| next.sample(1e-4).border);
                if let (Some(bmax), Some(rb)) = (bmax, end_border) {
                    if (bmax.x - rb.x).abs() > 1.0 || (bmax.y - rb.y).abs() > 1.0 {
                        gap_arc(end.point, rb, bmax, forward, &mut buf, end_payload);
                    }
                }
            }
        }

        let (mut points, mut border, payload) = buf.finish();
        let mut controls: Vec<Point> = ctrls
            .iter()
            .zip(&corners)
            .flat_map(|(c, p)| [c.0, *p, c.1])
            .collect();
        ctx.forward(&mut controls, "brush controls")?;
        ctx.forward(&mut points, "brush")?;
        ctx.forward(&mut border, "brush border")?;

        Ok(ShapeGeometry {
            anchor: controls.get(1).copied(),
            controls,
            points,
            border: border.into_iter().map(Coord::Point).collect(),
            payload,
            ..Default::default()
        })
    }
}
