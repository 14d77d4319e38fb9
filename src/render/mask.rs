use image::{GrayImage, Luma};

use crate::foundation::core::{Canvas, Point};
use crate::foundation::error::FrameResult;
use crate::geometry::quad::Quad;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Rasterize the quadrilateral into a binary mask the size of `canvas`.
///
/// Pixel `(x, y)` is on when its center `(x + 0.5, y + 0.5)` lies inside the convex hull of the
/// corners (boundary inclusive). Each row is filled as one span between the leftmost and
/// rightmost edge crossing, so non-convex input is filled as its hull.
pub fn quad_mask(quad: &Quad, canvas: Canvas) -> FrameResult<GrayImage> {
    canvas.pixel_count()?;
    let mut mask = GrayImage::from_pixel(canvas.width, canvas.height, Luma([MASK_OFF]));
    if canvas.is_empty() {
        return Ok(mask);
    }

    let pts = quad.points();
    let bounds = quad.bounds();
    let row_start = (bounds.y0 - 0.5).ceil().max(0.0) as u32;
    let row_end = (bounds.y1 - 0.5).floor().min(f64::from(canvas.height - 1));
    if row_end < 0.0 {
        return Ok(mask);
    }

    for y in row_start..=(row_end as u32) {
        let Some((x_min, x_max)) = row_span(&pts, f64::from(y) + 0.5) else {
            continue;
        };
        let first = (x_min - 0.5).ceil().max(0.0);
        let last = (x_max - 0.5).floor().min(f64::from(canvas.width - 1));
        if last < first {
            continue;
        }
        for x in (first as u32)..=(last as u32) {
            mask.put_pixel(x, y, Luma([MASK_ON]));
        }
    }
    Ok(mask)
}

/// Leftmost and rightmost crossing of the horizontal line `y = cy` with the polygon edges.
fn row_span(pts: &[Point; 4], cy: f64) -> Option<(f64, f64)> {
    let mut span: Option<(f64, f64)> = None;
    let mut widen = |x: f64| {
        span = Some(match span {
            Some((lo, hi)) => (lo.min(x), hi.max(x)),
            None => (x, x),
        });
    };

    for i in 0..4 {
        let p = pts[i];
        let q = pts[(i + 1) % 4];
        let (lo, hi) = if p.y <= q.y { (p.y, q.y) } else { (q.y, p.y) };
        if cy < lo || cy > hi {
            continue;
        }
        if p.y == q.y {
            widen(p.x);
            widen(q.x);
        } else {
            widen(p.x + (cy - p.y) * (q.x - p.x) / (q.y - p.y));
        }
    }
    span
}
