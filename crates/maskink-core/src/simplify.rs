//! Reduction of raw brush input to stroke corners.

use crate::forms::BrushPoint;
use kurbo::Point;

const BORDER_WEIGHT: f64 = 1.0;
const HARDNESS_WEIGHT: f64 = 0.01;
const DENSITY_WEIGHT: f64 = 0.01;

/// One raw input sample of a brush stroke, in normalized units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSample {
    pub position: Point,
    pub border: f64,
    pub hardness: f64,
    pub density: f64,
}

impl StrokeSample {
    pub fn new(position: Point, border: f64, hardness: f64, density: f64) -> Self {
        Self {
            position,
            border,
            hardness,
            density,
        }
    }

    fn to_brush_point(self) -> BrushPoint {
        BrushPoint::new(self.position, self.border, self.hardness, self.density)
    }
}

/// Squared distance of `p` from the segment `a..b`, with payload differences
/// against the interpolated payload at the projection.
fn weighted_distance2(p: &StrokeSample, a: &StrokeSample, b: &StrokeSample) -> f64 {
    let d = b.position - a.position;
    let len2 = d.hypot2();
    let t = if len2 < f64::EPSILON {
        0.0
    } else {
        ((p.position - a.position).dot(d) / len2).clamp(0.0, 1.0)
    };
    let lerp = |x: f64, y: f64| x + (y - x) * t;

    let proj = a.position + d * t;
    let db = p.border - lerp(a.border, b.border);
    let dh = p.hardness - lerp(a.hardness, b.hardness);
    let dd = p.density - lerp(a.density, b.density);
    (p.position - proj).hypot2()
        + BORDER_WEIGHT * db * db
        + HARDNESS_WEIGHT * dh * dh
        + DENSITY_WEIGHT * dd * dd
}

fn rdp(samples: &[StrokeSample], epsilon2: f64, out: &mut Vec<StrokeSample>) {
    let first = samples[0];
    let last = samples[samples.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;
    for (i, s) in samples.iter().enumerate().skip(1).take(samples.len().saturating_sub(2)) {
        let dist = weighted_distance2(s, &first, &last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_index > 0 && max_dist >= epsilon2 {
        rdp(&samples[..=max_index], epsilon2, out);
        // junction is already in `out`
        out.pop();
        rdp(&samples[max_index..], epsilon2, out);
    } else {
        out.push(first);
        out.push(last);
    }
}

/// Ramer-Douglas-Peucker reduction of a raw stroke into brush corners.
///
/// The returned corners are smooth nodes with auto-computed controls and an
/// equal border on both sides.
pub fn simplify_brush(samples: &[StrokeSample], tolerance: f64) -> Vec<BrushPoint> {
    if samples.len() < 3 {
        return samples.iter().map(|s| s.to_brush_point()).collect();
    }
    let mut kept = Vec::new();
    rdp(samples, tolerance * tolerance, &mut kept);
    log::trace!("simplified brush stroke from {} to {} points", samples.len(), kept.len());
    kept.into_iter().map(StrokeSample::to_brush_point).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::PointState;

    fn sample(x: f64, y: f64) -> StrokeSample {
        StrokeSample::new(Point::new(x, y), 0.02, 0.66, 1.0)
    }

    #[test]
    fn test_straight_stroke_collapses() {
        let samples: Vec<_> = (0..20).map(|i| sample(i as f64 * 0.01, 0.5)).collect();
        let points = simplify_brush(&samples, 0.001);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].corner, samples[0].position);
        assert_eq!(points[1].corner, samples[19].position);
        assert_eq!(points[0].state, PointState::Normal);
        assert_eq!(points[0].ctrl1, None);
        assert_eq!(points[0].border, [0.02, 0.02]);
    }

    #[test]
    fn test_corner_is_kept() {
        let mut samples: Vec<_> = (0..10).map(|i| sample(i as f64 * 0.01, 0.0)).collect();
        samples.extend((1..10).map(|i| sample(0.09, i as f64 * 0.01)));
        let points = simplify_brush(&samples, 0.001);
        assert_eq!(points.len(), 3);
        assert!((points[1].corner.x - 0.09).abs() < 1e-12);
        assert!(points[1].corner.y.abs() < 1e-12);
    }

    #[test]
    fn test_border_change_is_kept() {
        let mut samples: Vec<_> = (0..10).map(|i| sample(i as f64 * 0.01, 0.5)).collect();
        samples[5].border = 0.1;
        let points = simplify_brush(&samples, 0.01);
        assert!(points.iter().any(|p| (p.border[0] - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_small_hardness_change_is_dropped() {
        let mut samples: Vec<_> = (0..10).map(|i| sample(i as f64 * 0.01, 0.5)).collect();
        // weighted 0.01: contributes 0.1 * 0.1 * 0.01 = 1e-4 < 0.02^2 = 4e-4
        samples[5].hardness = 0.76;
        let points = simplify_brush(&samples, 0.02);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_short_input_passes_through() {
        let samples = vec![sample(0.1, 0.1), sample(0.2, 0.2)];
        assert_eq!(simplify_brush(&samples, 0.01).len(), 2);
        assert!(simplify_brush(&[], 0.01).is_empty());
    }
}
