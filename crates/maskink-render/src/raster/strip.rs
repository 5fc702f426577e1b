//! Falloff strips from boundary samples to their border targets.

use super::Grid;
use kurbo::Point;
use maskink_core::Payload;

/// Opacity profile along one strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum StripProfile {
    /// Linear ramp from 1 at the boundary to 0 at the border.
    Linear,
    /// Plateau over the `hardness` fraction, then a linear ramp, scaled by `density`.
    Brush { hardness: f64, density: f64 },
}

impl StripProfile {
    fn value(&self, i: usize, len: usize) -> f32 {
        match *self {
            StripProfile::Linear => (1.0 - i as f64 / len as f64) as f32,
            StripProfile::Brush { hardness, density } => {
                let solid = (len as f64 * hardness) as usize;
                let soft = (len - solid.min(len)).max(1);
                let ramp = if i <= solid {
                    1.0
                } else {
                    1.0 - (i - solid) as f64 / soft as f64
                };
                (density * ramp) as f32
            }
        }
    }
}

/// Stamp one strip from `p0` towards `p1`, keeping the maximum per pixel.
pub(crate) fn draw_strip(grid: &mut Grid<'_>, p0: Point, p1: Point, profile: StripProfile) {
    let d = p1 - p0;
    let len = d.hypot() as usize + 1;
    for i in 0..len {
        let pos = p0 + d * (i as f64 / len as f64);
        let (x, y) = (pos.x.floor() as i64, pos.y.floor() as i64);
        let op = profile.value(i, len);
        grid.raise(x, y, op);
        grid.raise(x - 1, y, op);
        grid.raise(x, y - 1, op);
    }
}

fn pixel(p: Point) -> (i64, i64) {
    (p.x.floor() as i64, p.y.floor() as i64)
}

/// Draw a strip for every boundary sample that has a border target.
///
/// With `payload` the strips use the brush profile of each sample, otherwise
/// a linear ramp. A strip whose endpoints land on the same pixels as the
/// previous one is skipped.
pub(crate) fn draw_strips(
    grid: &mut Grid<'_>,
    points: &[Point],
    targets: &[Option<Point>],
    payload: Option<&[Payload]>,
) {
    let mut last: Option<((i64, i64), (i64, i64))> = None;
    for (i, (&p0, target)) in points.iter().zip(targets).enumerate() {
        let Some(p1) = *target else {
            continue;
        };
        let ends = (pixel(p0), pixel(p1));
        if last == Some(ends) {
            continue;
        }
        last = Some(ends);
        let profile = match payload.and_then(|pl| pl.get(i)) {
            Some(pl) => StripProfile::Brush {
                hardness: pl.hardness,
                density: pl.density,
            },
            None => StripProfile::Linear,
        };
        draw_strip(grid, p0, p1, profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_strip_ramps_down() {
        let mut data = vec![0.0; 16 * 4];
        let mut grid = Grid::new(&mut data, 16, 4);
        draw_strip(&mut grid, Point::new(2.5, 2.5), Point::new(12.5, 2.5), StripProfile::Linear);
        let row = &data[2 * 16..3 * 16];
        assert_eq!(row[2], 1.0);
        assert!(row[7] > 0.0 && row[7] < 1.0);
        assert!(row[4] > row[9]);
        assert_eq!(row[14], 0.0);
    }

    #[test]
    fn test_brush_profile_plateau() {
        let profile = StripProfile::Brush {
            hardness: 0.5,
            density: 0.8,
        };
        assert!((profile.value(0, 10) - 0.8).abs() < 1e-6);
        assert!((profile.value(5, 10) - 0.8).abs() < 1e-6);
        assert!(profile.value(8, 10) < 0.8);
        let hard = StripProfile::Brush {
            hardness: 1.0,
            density: 1.0,
        };
        assert_eq!(hard.value(9, 10), 1.0);
    }

    #[test]
    fn test_strip_off_grid_is_clipped() {
        let mut data = vec![0.0; 4];
        let mut grid = Grid::new(&mut data, 2, 2);
        draw_strip(&mut grid, Point::new(-5.0, -5.0), Point::new(-1.0, -1.0), StripProfile::Linear);
        assert!(data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_targets_are_skipped() {
        let mut data = vec![0.0; 64];
        let mut grid = Grid::new(&mut data, 8, 8);
        let points = [Point::new(1.0, 1.0), Point::new(5.0, 5.0)];
        draw_strips(&mut grid, &points, &[None, Some(Point::new(6.5, 5.0))], None);
        assert_eq!(data[8 + 1], 0.0);
        assert_eq!(data[5 * 8 + 5], 1.0);
    }
}
