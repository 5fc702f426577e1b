//! Detection of self-overlapping stretches in a closed border curve.
//!
//! The border is walked from its rightmost sample and rasterized onto an
//! integer grid covering its bounding box. Every cell remembers the last
//! border index that touched it. When a later index lands on a cell owned
//! by an earlier, non-adjacent index and the stretch between them contains
//! none of the four extremal samples, that stretch is a loop created by the
//! offset and gets elided.

use crate::error::{MaskError, MaskResult, try_alloc};
use crate::geometry::Coord;
use kurbo::Point;

/// Smallest grid (in cells) worth scanning.
const MIN_GRID_CELLS: i64 = 10;

/// Border indices `[start, end)` to elide. `start > end` when the stretch
/// wraps past the end of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipInterval {
    pub start: usize,
    pub end: usize,
}

/// Integer pixel walk from `last` to `to`, returned with `to` first.
///
/// Only horizontal jumps are densified; the in-between columns are filled in
/// order from `to` back towards `last`, with vertical runs where the line is
/// steep.
fn fill_gaps(last: (i64, i64), to: (i64, i64), out: &mut Vec<(i64, i64)>) {
    out.clear();
    out.push(to);
    let (lastx, lasty) = last;
    let (x, y) = to;
    let column = |j: i64, out: &mut Vec<(i64, i64)>| {
        let yyy = ((j - lastx) as f64 * (y - lasty) as f64 / (x - lastx) as f64 + lasty as f64) as i64;
        let lasty2 = out.last().map_or(yyy, |p| p.1);
        if lasty2 - yyy > 1 {
            out.extend((lasty2 + 1..yyy).map(|jj| (j, jj)));
        } else if lasty2 - yyy < -1 {
            out.extend((yyy + 1..lasty2).rev().map(|jj| (j, jj)));
        }
        out.push((j, yyy));
    };
    if x - lastx > 1 {
        for j in (lastx + 1..x).rev() {
            column(j, out);
        }
    } else if x - lastx < -1 {
        for j in x + 1..lastx {
            column(j, out);
        }
    }
}

fn cell(p: Point) -> (i64, i64) {
    (p.x as i64, p.y as i64)
}

/// Find the self-intersecting stretches of a closed border.
///
/// `corners` bounds the number of intervals reported (four per corner).
/// Fails with [`MaskError::SelfIntersectionGridTooSmall`] when the border
/// covers fewer than ten grid cells; callers treat that as "no intervals".
pub fn find_self_intersections(border: &[Point], corners: usize) -> MaskResult<Vec<SkipInterval>> {
    let n = border.len();
    if corners == 0 || n == 0 {
        return Ok(Vec::new());
    }

    let mut xmin = i64::MAX;
    let mut xmax = i64::MIN;
    let mut ymin = i64::MAX;
    let mut ymax = i64::MIN;
    // xmin, xmax, ymin, ymax
    let mut extrema = [0usize; 4];
    for (i, p) in border.iter().enumerate() {
        if p.x < xmin as f64 {
            xmin = p.x as i64;
            extrema[0] = i;
        }
        if p.x > xmax as f64 {
            xmax = p.x as i64;
            extrema[1] = i;
        }
        if p.y < ymin as f64 {
            ymin = p.y as i64;
            extrema[2] = i;
        }
        if p.y > ymax as f64 {
            ymax = p.y as i64;
            extrema[3] = i;
        }
    }
    xmin -= 1;
    ymin -= 1;
    xmax += 1;
    ymax += 1;
    let wb = xmax - xmin;
    let hb = ymax - ymin;
    if wb < 0 || hb < 0 || wb * hb < MIN_GRID_CELLS {
        return Err(MaskError::SelfIntersectionGridTooSmall {
            width: wb,
            height: hb,
        });
    }

    let size = (wb * hb) as usize;
    let mut grid: Vec<Option<usize>> = try_alloc(size, "self-intersection grid")?;
    grid.resize(size, None);

    let outside = |e: usize, lo: usize, hi: usize| e < lo || e > hi;
    let between = |e: usize, lo: usize, hi: usize| e > lo && e < hi;

    let mut intervals: Vec<SkipInterval> = Vec::new();
    let mut extra = Vec::new();
    let mut last = cell(border[(extrema[1] + n - 1) % n]);

    for ii in 0..n {
        // Start on the rightmost sample; it cannot sit inside a loop.
        let i = (ii + extrema[1]) % n;
        if intervals.len() >= corners * 4 {
            break;
        }

        fill_gaps(last, cell(border[i]), &mut extra);

        for &(xx, yy) in extra.iter().rev() {
            let idx = (yy - ymin) * wb + (xx - xmin);
            if idx < 0 || idx as usize >= size {
                return Ok(Vec::new());
            }
            let idx = idx as usize;
            let neighbours = [
                grid[idx],
                if xx > xmin { grid[idx - 1] } else { None },
                if yy > ymin { grid[idx - wb as usize] } else { None },
            ];

            for v in neighbours {
                let Some(v) = v else {
                    grid[idx] = Some(i);
                    continue;
                };
                if (xx, yy) == last || v + 1 == i {
                    // Still on the previous position, not a real crossing.
                    grid[idx] = Some(i);
                } else if (i > v && extrema.iter().all(|&e| outside(e, v, i)))
                    || (i < v && extrema.iter().all(|&e| between(e, i, v)))
                {
                    match intervals.last_mut() {
                        Some(prev)
                            if prev.start >= v
                                && prev.end <= i
                                && (v as i64 - i as i64) * (prev.start as i64 - prev.end as i64) > 0 =>
                        {
                            prev.start = v;
                            prev.end = i;
                        }
                        _ => intervals.push(SkipInterval { start: v, end: i }),
                    }
                }
            }
            last = (xx, yy);
        }
    }

    Ok(intervals)
}

/// Encode elided stretches as skip markers over the border samples.
///
/// A wrapping stretch sends the walk from the first sample to `end` and
/// drops everything from `start` to the end of the sequence.
pub fn apply_skips(border: Vec<Point>, intervals: &[SkipInterval]) -> Vec<Coord> {
    let mut coords: Vec<Coord> = border.into_iter().map(Coord::Point).collect();
    if coords.is_empty() {
        return coords;
    }
    for iv in intervals {
        if iv.start >= coords.len() {
            continue;
        }
        if iv.start <= iv.end {
            coords[iv.start] = Coord::SkipTo(iv.end);
        } else {
            if iv.end > 0 {
                coords[0] = match coords[0] {
                    Coord::SkipTo(to) => Coord::SkipTo(to.max(iv.end)),
                    _ => Coord::SkipTo(iv.end),
                };
            }
            coords[iv.start] = Coord::SkipToEnd;
        }
    }
    coords
}
