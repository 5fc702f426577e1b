//! Adaptive flattening of cubic segments together with their feather offset.
//!
//! A segment is bisected on its parameter until consecutive boundary samples
//! and consecutive border samples each fall into the same pixel (truncated
//! coordinates). The sample at a bisection point is evaluated once and shared
//! by both halves. Gaps the border leaves around sharp corners are closed
//! with arcs of samples centred on the boundary point.

use crate::geometry::Payload;
use kurbo::{CubicBez, ParamCurve, ParamCurveDeriv, Point, Vec2};
use std::f64::consts::{PI, TAU};

/// Bisection stops below this parameter span regardless of pixel distance.
pub const MIN_PARAM_STEP: f64 = 1e-4;

/// One end of a cubic segment: the corner, the adjacent control point and
/// the signed feather radius in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub corner: Point,
    pub ctrl: Point,
    pub radius: f64,
    pub payload: Payload,
}

impl Node {
    pub fn new(corner: Point, ctrl: Point, radius: f64) -> Self {
        Self {
            corner,
            ctrl,
            radius,
            payload: Payload::default(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

/// A boundary sample with its border sample. The border is undefined where
/// the curve derivative vanishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub point: Point,
    pub border: Option<Point>,
}

/// A cubic segment with a smoothly varying normal offset.
#[derive(Debug, Clone, Copy)]
pub struct OffsetSegment {
    curve: CubicBez,
    r0: f64,
    r1: f64,
    pay0: Payload,
    pay1: Payload,
}

impl OffsetSegment {
    pub fn new(from: &Node, to: &Node) -> Self {
        Self {
            curve: CubicBez::new(from.corner, from.ctrl, to.ctrl, to.corner),
            r0: from.radius,
            r1: to.radius,
            pay0: from.payload,
            pay1: to.payload,
        }
    }

    /// Offset radius at `t`, eased with smoothstep between the two ends.
    pub fn radius_at(&self, t: f64) -> f64 {
        self.r0 + (self.r1 - self.r0) * t * t * (3.0 - 2.0 * t)
    }

    pub fn payload_at(&self, t: f64) -> Payload {
        self.pay0.lerp(self.pay1, t)
    }

    pub fn sample(&self, t: f64) -> Sample {
        self.sample_with_radius(t, self.radius_at(t))
    }

    /// Boundary point at `t` and the point offset by `radius` along the normal.
    pub fn sample_with_radius(&self, t: f64, radius: f64) -> Sample {
        let point = self.curve.eval(t);
        let d = self.curve.deriv().eval(t).to_vec2();
        if d.x == 0.0 && d.y == 0.0 {
            return Sample { point, border: None };
        }
        let l = d.hypot();
        let border = point + Vec2::new(radius * d.y / l, -radius * d.x / l);
        Sample {
            point,
            border: Some(border),
        }
    }
}

/// Growable boundary/border/payload sample store, kept in lockstep.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    pub points: Vec<Point>,
    pub border: Vec<Option<Point>>,
    pub payload: Vec<Payload>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Point, border: Option<Point>, payload: Payload) {
        self.points.push(point);
        self.border.push(border);
        self.payload.push(payload);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Last defined border sample.
    pub fn last_border(&self) -> Option<Point> {
        self.border.iter().rev().find_map(|b| *b)
    }

    /// Harvest the samples, filling undefined border entries from their
    /// nearest defined predecessor (or the first defined one).
    pub fn finish(self) -> (Vec<Point>, Vec<Point>, Vec<Payload>) {
        let first = self.border.iter().find_map(|b| *b);
        let mut last = first;
        let border = self
            .border
            .iter()
            .zip(&self.points)
            .map(|(b, p)| {
                if b.is_some() {
                    last = *b;
                }
                last.unwrap_or(*p)
            })
            .collect();
        (self.points, border, self.payload)
    }
}

/// Recursive segment flattener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flattener {
    small_gaps: bool,
}

impl Flattener {
    /// Flattener for closed paths.
    pub fn new() -> Self {
        Self { small_gaps: false }
    }

    /// Flattener that also closes border jumps left at the bisection limit
    /// with short arcs (used for brush strokes).
    pub fn with_small_gaps() -> Self {
        Self { small_gaps: true }
    }

    /// Flatten `seg` into `out`. The sample at t=0 is not emitted; it is the
    /// end of the previous segment. Returns the last emitted sample.
    pub fn flatten(&self, seg: &OffsetSegment, out: &mut SampleBuffer) -> Sample {
        let start = seg.sample(0.0);
        let end = seg.sample(1.0);
        self.recurse(seg, 0.0, 1.0, start, end, out)
    }

    fn recurse(
        &self,
        seg: &OffsetSegment,
        tmin: f64,
        tmax: f64,
        min: Sample,
        max: Sample,
        out: &mut SampleBuffer,
    ) -> Sample {
        if tmax - tmin < MIN_PARAM_STEP
            || (same_pixel(min.point, max.point) && border_close(min.border, max.border))
        {
            let payload = seg.payload_at(tmax);
            let mut max = max;
            if self.small_gaps {
                let bmin = min.border.or(max.border);
                let bmax = max.border.or(min.border);
                if let (Some(bmin), Some(bmax)) = (bmin, bmax) {
                    max.border = Some(bmax);
                    if (bmax.x.trunc() - bmin.x.trunc()).abs() > 2.0
                        || (bmax.y.trunc() - bmin.y.trunc()).abs() > 2.0
                    {
                        small_gap_arc(max.point, bmin, bmax, out, payload);
                    }
                }
            }
            out.push(max.point, max.border, payload);
            return max;
        }

        let tx = (tmin + tmax) / 2.0;
        let mid = seg.sample(tx);
        let left = self.recurse(seg, tmin, tx, min, mid, out);
        self.recurse(seg, tx, tmax, left, max, out)
    }
}

fn same_pixel(a: Point, b: Point) -> bool {
    a.x.trunc() == b.x.trunc() && a.y.trunc() == b.y.trunc()
}

fn border_close(a: Option<Point>, b: Option<Point>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_pixel(a, b),
        _ => true,
    }
}

fn push_arc(
    center: Point,
    (r1, r2): (f64, f64),
    a1: f64,
    delta: f64,
    steps: i64,
    out: &mut SampleBuffer,
    payload: Payload,
) {
    let incra = delta / steps as f64;
    let incrr = (r2 - r1) / steps as f64;
    for i in 1..steps {
        let rr = r1 + incrr * i as f64;
        let aa = a1 + incra * i as f64;
        let b = Point::new(center.x + rr * aa.cos(), center.y + rr * aa.sin());
        out.push(center, Some(b), payload);
    }
}

/// Fill the border gap between `from` and `to` around `center`, turning in
/// the shape's winding direction. The arc may exceed half a turn.
pub fn gap_arc(
    center: Point,
    from: Point,
    to: Point,
    clockwise: bool,
    out: &mut SampleBuffer,
    payload: Payload,
) {
    let mut a1 = (from.y - center.y).atan2(from.x - center.x);
    let mut a2 = (to.y - center.y).atan2(to.x - center.x);
    if a1 == a2 {
        return;
    }
    if a2 < a1 && clockwise {
        a2 += TAU;
    }
    if a2 > a1 && !clockwise {
        a1 += TAU;
    }
    let r1 = (from - center).hypot();
    let r2 = (to - center).hypot();
    let steps = ((a2 - a1).abs() * r1.max(r2)) as i64;
    if steps < 2 {
        return;
    }
    push_arc(center, (r1, r2), a1, a2 - a1, steps, out, payload);
}

/// Fill a small border gap in the shortest angular direction.
pub fn small_gap_arc(center: Point, from: Point, to: Point, out: &mut SampleBuffer, payload: Payload) {
    let a1 = ((from.y - center.y).atan2(from.x - center.x) + TAU) % TAU;
    let a2 = ((to.y - center.y).atan2(to.x - center.x) + TAU) % TAU;
    if a1 == a2 {
        return;
    }
    let r1 = (from - center).hypot();
    let r2 = (to - center).hypot();
    let mut delta = a2 - a1;
    if delta.abs() > PI {
        delta -= TAU.copysign(delta);
    }
    let steps = (delta.abs() * r1.max(r2)) as i64;
    if steps < 2 {
        return;
    }
    push_arc(center, (r1, r2), a1, delta, steps, out, payload);
}

/// A full circle of border samples around `center`, starting after `from`.
pub fn stamp(center: Point, from: Point, out: &mut SampleBuffer, payload: Payload) {
    let a1 = (from.y - center.y).atan2(from.x - center.x);
    let rad = (from - center).hypot();
    let steps = (TAU * rad) as i64;
    if steps < 2 {
        return;
    }
    let incra = TAU / steps as f64;
    for i in 1..=steps {
        let aa = a1 + incra * i as f64;
        let b = Point::new(center.x + rad * aa.cos(), center.y + rad * aa.sin());
        out.push(center, Some(b), payload);
    }
}

/// Bezier control points of the segment p2→p3 matching a Catmull-Rom spline.
pub fn catmull_to_bezier(p1: Point, p2: Point, p3: Point, p4: Point) -> (Point, Point) {
    let b1 = Point::new(
        (-p1.x + 6.0 * p2.x + p3.x) / 6.0,
        (-p1.y + 6.0 * p2.y + p3.y) / 6.0,
    );
    let b2 = Point::new(
        (p2.x + 6.0 * p3.x - p4.x) / 6.0,
        (p2.y + 6.0 * p3.y - p4.y) / 6.0,
    );
    (b1, b2)
}

/// Winding of a closed corner polygon. Fewer than three corners count as clockwise.
pub fn is_clockwise(corners: &[Point]) -> bool {
    if corners.len() < 3 {
        return true;
    }
    let sum: f64 = corners
        .iter()
        .zip(corners.iter().cycle().skip(1))
        .map(|(a, b)| (b.x - a.x) * (b.y + a.y))
        .sum();
    sum < 0.0
}
