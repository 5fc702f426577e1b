//! Scanline parity fill of a closed boundary.
//!
//! A pixel at integer position `(x, y)` is filled exactly when the ray
//! casting test of `point_in_polygon` places it inside: an edge crosses row
//! `y` when `y` lies in its half-open y-range, and the pixel is inside when an
//! odd number of crossings lie strictly to its right.

use super::Grid;
use kurbo::Point;
use maskink_core::MaskResult;
use maskink_core::error::try_alloc;

/// Rows of an edge that the half-open crossing rule counts, unclipped.
fn edge_rows(a: Point, b: Point) -> Option<(i64, i64)> {
    if a.y < b.y {
        // a.y < y <= b.y
        Some((a.y.floor() as i64 + 1, b.y.floor() as i64))
    } else if a.y > b.y {
        // b.y <= y < a.y
        Some((b.y.ceil() as i64, a.y.ceil() as i64 - 1))
    } else {
        None
    }
}

/// Set every pixel inside the closed polygon `points` to 1.
pub(crate) fn fill_interior(grid: &mut Grid<'_>, points: &[Point]) -> MaskResult<()> {
    if points.len() < 3 || grid.width == 0 || grid.height == 0 {
        return Ok(());
    }
    let mut crossings: Vec<Vec<f64>> = try_alloc(grid.height, "scanline table")?;
    crossings.resize_with(grid.height, Vec::new);

    let last_row = grid.height as i64 - 1;
    let mut prev = points[points.len() - 1];
    for &cur in points {
        if let Some((r0, r1)) = edge_rows(prev, cur) {
            let slope = (cur.x - prev.x) / (cur.y - prev.y);
            for y in r0.max(0)..=r1.min(last_row) {
                let x = prev.x + (y as f64 - prev.y) * slope;
                crossings[y as usize].push(x);
            }
        }
        prev = cur;
    }

    let width = grid.width as i64;
    for (y, row) in crossings.iter_mut().enumerate() {
        row.sort_by(f64::total_cmp);
        let line = &mut grid.data[y * grid.width..(y + 1) * grid.width];
        for pair in row.chunks_exact(2) {
            let from = (pair[0].ceil() as i64).clamp(0, width);
            let to = (pair[1].ceil() as i64).clamp(0, width);
            for v in &mut line[from as usize..to.max(from) as usize] {
                *v = 1.0;
            }
        }
    }
    Ok(())
}
