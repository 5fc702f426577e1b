//! Closed-form falloff evaluated through the backward transform, either at
//! every pixel or on a coarse mesh with bilinear interpolation.

use super::try_fill_rows;
use kurbo::Point;
use maskink_core::error::try_zeroed;
use maskink_core::{MaskContext, MaskResult};

/// Fill `out` (`width * height`) with `value` evaluated at the backward
/// transformed position `to_frame(x, y)` of each pixel.
///
/// With `step > 1` only every `step`-th node is evaluated and the rest is
/// interpolated.
pub(crate) fn evaluate<P, V>(
    ctx: &MaskContext<'_>,
    out: &mut [f32],
    width: usize,
    height: usize,
    step: usize,
    to_frame: P,
    value: V,
) -> MaskResult<()>
where
    P: Fn(f64, f64) -> Point + Send + Sync,
    V: Fn(Point) -> f32 + Send + Sync,
{
    if width == 0 || height == 0 {
        return Ok(());
    }
    if step <= 1 {
        return sample_nodes(ctx, out, width, 1, &to_frame, &value);
    }

    let gw = (width - 1) / step + 2;
    let gh = (height - 1) / step + 2;
    let mut nodes = try_zeroed(gw * gh, "mask mesh")?;
    sample_nodes(ctx, &mut nodes, gw, step, &to_frame, &value)?;

    let inv = 1.0 / step as f32;
    let nodes = &nodes;
    try_fill_rows(out, width, |y, row| {
        let j = y / step;
        let fy = (y % step) as f32 * inv;
        let top = &nodes[j * gw..(j + 1) * gw];
        let bottom = &nodes[(j + 1) * gw..(j + 2) * gw];
        for (x, v) in row.iter_mut().enumerate() {
            let i = x / step;
            let fx = (x % step) as f32 * inv;
            let t = top[i] + (top[i + 1] - top[i]) * fx;
            let b = bottom[i] + (bottom[i + 1] - bottom[i]) * fx;
            *v = t + (b - t) * fy;
        }
        Ok(())
    })
}

fn sample_nodes<P, V>(
    ctx: &MaskContext<'_>,
    nodes: &mut [f32],
    columns: usize,
    step: usize,
    to_frame: &P,
    value: &V,
) -> MaskResult<()>
where
    P: Fn(f64, f64) -> Point + Send + Sync,
    V: Fn(Point) -> f32 + Send + Sync,
{
    try_fill_rows(nodes, columns, |j, row| {
        let y = (j * step) as f64;
        let mut points: Vec<Point> = (0..row.len())
            .map(|i| to_frame((i * step) as f64, y))
            .collect();
        ctx.backward(&mut points, "mask pixels")?;
        for (v, p) in row.iter_mut().zip(points) {
            *v = value(p);
        }
        Ok(())
    })
}
