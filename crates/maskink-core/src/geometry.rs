//! Sampled shape geometry and polygon queries.
//!
//! Samplers produce a boundary polyline (`points`), the feather border
//! (`border`) and optional extras. Border samples correspond to boundary
//! samples by index. Self-intersecting stretches of a border are elided by
//! explicit skip markers instead of in-band sentinel coordinates.

use kurbo::{Point, Rect};

/// One entry of a border sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    /// A sample position in pixel space.
    Point(Point),
    /// Elided stretch: the walk continues at the given index.
    SkipTo(usize),
    /// The rest of the sequence is elided; a closed walk wraps to the start.
    SkipToEnd,
}

impl Coord {
    pub fn point(&self) -> Option<Point> {
        match self {
            Coord::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_marker(&self) -> bool {
        !matches!(self, Coord::Point(_))
    }
}

impl From<Point> for Coord {
    fn from(p: Point) -> Self {
        Coord::Point(p)
    }
}

/// Brush stroke attributes carried with each sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload {
    pub hardness: f64,
    pub density: f64,
}

impl Payload {
    pub fn new(hardness: f64, density: f64) -> Self {
        Self { hardness, density }
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(self, other: Payload, t: f64) -> Payload {
        Payload {
            hardness: self.hardness + (other.hardness - self.hardness) * t,
            density: self.density + (other.density - self.density) * t,
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Output of a shape sampler, in pipeline pixel space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeGeometry {
    /// Center or anchor of the shape, when it has one.
    pub anchor: Option<Point>,
    /// Control nodes (axis ends, pivots, bezier handles).
    pub controls: Vec<Point>,
    /// Boundary samples.
    pub points: Vec<Point>,
    /// Feather border samples, possibly with skip markers.
    pub border: Vec<Coord>,
    /// Per-sample hardness/density (brush only).
    pub payload: Vec<Payload>,
    /// Boundary samples moved onto the clone source.
    pub source: Vec<Point>,
}

impl ShapeGeometry {
    /// Iterate over the border positions, following skip markers.
    pub fn border_walk(&self) -> BorderWalk<'_> {
        BorderWalk::new(&self.border)
    }

    /// Bounding box of the boundary and the (skip-aware) border.
    pub fn bounds(&self) -> Option<Rect> {
        bounds_of(self.points.iter().copied().chain(self.border_walk()))
    }

    /// Bounding box of the clone source samples.
    pub fn source_bounds(&self) -> Option<Rect> {
        bounds_of(self.source.iter().copied())
    }

    /// Ray-casting test against the boundary.
    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.points)
    }

    /// Ray-casting test against the feather border, honoring skip markers.
    pub fn border_contains(&self, p: Point) -> bool {
        point_in_coords(p, &self.border)
    }

    /// For each boundary sample, the border position its falloff strip runs to.
    ///
    /// Inside an elided stretch the strip targets the border sample at the end of
    /// the stretch; after a trailing elision it keeps the last sample before it.
    pub fn falloff_targets(&self) -> Vec<Option<Point>> {
        let n = self.border.len().min(self.points.len());
        let mut targets = Vec::with_capacity(n);
        let mut next: Option<usize> = None;
        for i in 0..n {
            let mut idx = next.unwrap_or(i);
            if next == Some(i) {
                next = None;
            }
            let mut hops = 0;
            let target = loop {
                match self.border.get(idx) {
                    Some(Coord::Point(p)) => break Some(*p),
                    Some(Coord::SkipTo(to)) => {
                        idx = *to;
                        next = Some(idx);
                    }
                    Some(Coord::SkipToEnd) => {
                        idx = if i == 0 { n - 1 } else { i - 1 };
                        next = Some(idx);
                    }
                    None => break None,
                }
                hops += 1;
                if hops > n {
                    break None;
                }
            };
            targets.push(target);
        }
        targets
    }
}

/// Iterator over border positions honoring [`Coord`] skip markers.
pub struct BorderWalk<'a> {
    coords: &'a [Coord],
    index: usize,
    steps: usize,
}

impl<'a> BorderWalk<'a> {
    pub fn new(coords: &'a [Coord]) -> Self {
        Self {
            coords,
            index: 0,
            steps: 0,
        }
    }
}

impl Iterator for BorderWalk<'_> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        loop {
            // Malformed markers could loop forever.
            self.steps += 1;
            if self.steps > 2 * self.coords.len() + 2 {
                return None;
            }
            match self.coords.get(self.index)? {
                Coord::Point(p) => {
                    self.index += 1;
                    return Some(*p);
                }
                Coord::SkipTo(to) => {
                    if *to <= self.index {
                        return None;
                    }
                    self.index = *to;
                }
                Coord::SkipToEnd => return None,
            }
        }
    }
}

/// Bounding box of a point sequence, ignoring non-finite coordinates.
pub fn bounds_of(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
    let mut rect: Option<Rect> = None;
    for p in points {
        if !(p.x.is_finite() && p.y.is_finite()) {
            continue;
        }
        rect = Some(match rect {
            Some(r) => r.union_pt(p),
            None => Rect::from_points(p, p),
        });
    }
    rect
}

fn crosses(p: Point, a: Point, b: Point) -> bool {
    if (p.y <= b.y && p.y > a.y) || (p.y >= b.y && p.y < a.y) {
        let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
        x > p.x
    } else {
        false
    }
}

/// Ray-casting parity test over a closed polygon.
///
/// An edge counts when the ray's y lies in its half-open y-range and the
/// crossing is to the right of `p`.
pub fn point_in_polygon(p: Point, points: &[Point]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut prev = points[points.len() - 1];
    for &cur in points {
        if crosses(p, prev, cur) {
            inside = !inside;
        }
        prev = cur;
    }
    inside
}

/// Ray-casting parity test over a closed [`Coord`] sequence, following skips.
pub fn point_in_coords(p: Point, coords: &[Coord]) -> bool {
    if coords.len() < 3 {
        return false;
    }
    let start = match coords[0] {
        Coord::SkipTo(to) => to,
        _ => 0,
    };
    let Some(first) = coords.get(start).and_then(Coord::point) else {
        return false;
    };

    let mut inside = false;
    let mut current = first;
    let mut next = start + 1;
    for _ in 0..2 * coords.len() + 2 {
        if next >= coords.len() {
            next = start;
        }
        let target = match coords[next] {
            Coord::Point(q) => q,
            Coord::SkipTo(to) if to > next => {
                next = to;
                continue;
            }
            _ => {
                next = start;
                first
            }
        };
        if crosses(p, current, target) {
            inside = !inside;
        }
        if next == start {
            break;
        }
        current = target;
        next += 1;
    }
    inside
}

/// Whether `p` lies inside the sampled boundary of a shape.
pub fn point_in_form(geometry: &ShapeGeometry, p: Point) -> bool {
    geometry.contains(p)
}

/// Whether `p` lies inside the feather border of a shape.
pub fn point_in_border(geometry: &ShapeGeometry, p: Point) -> bool {
    geometry.border_contains(p)
}
