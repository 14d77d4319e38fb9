use image::{Rgb, Rgb32FImage, RgbImage};
use imageproc::geometric_transformations::{Interpolation, warp_into_with};

use crate::foundation::core::Canvas;
use crate::foundation::error::{FrameError, FrameResult};
use crate::geometry::homography::Homography;

/// Pull-backs up to this far outside the artwork (in source pixels) clamp to its edge.
const EDGE_TOLERANCE: f32 = 0.5;
/// Keeps clamped samples left of the last column so bilinear still has a pixel pair.
const EDGE_INSET: f32 = 1e-3;

/// Warp `src` through `forward` onto a black canvas of size `canvas`.
///
/// Canvas pixel `(x, y)` is sampled at its center `(x + 0.5, y + 0.5)`, the same point the
/// quad mask tests, pulled back through `forward^-1` and bilinearly interpolated. Pull-backs
/// within half a source pixel of the artwork clamp to its edge; anything further out stays
/// black. Interpolation runs in `f32` and is rounded once at the end.
pub fn warp_perspective(
    src: &RgbImage,
    forward: &Homography,
    canvas: Canvas,
) -> FrameResult<RgbImage> {
    if src.width() == 0 || src.height() == 0 {
        return Err(FrameError::decode("cannot warp an empty raster"));
    }
    canvas.pixel_count()?;

    let inverse = *forward.inverse().projection();
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;

    let linear = Rgb32FImage::from_fn(src.width(), src.height(), |x, y| {
        Rgb(src.get_pixel(x, y).0.map(f32::from))
    });
    let mut warped = Rgb32FImage::new(canvas.width, canvas.height);
    warp_into_with(
        &linear,
        |x, y| pull_back(inverse * (x + 0.5, y + 0.5), max_x, max_y),
        Interpolation::Bilinear,
        Rgb([0.0; 3]),
        &mut warped,
    );

    Ok(RgbImage::from_fn(canvas.width, canvas.height, |x, y| {
        Rgb(warped
            .get_pixel(x, y)
            .0
            .map(|v| v.round().clamp(0.0, 255.0) as u8))
    }))
}

/// Clamp a source position onto the artwork, or NaN (sampled as black) when it is too far out.
fn pull_back((sx, sy): (f32, f32), max_x: f32, max_y: f32) -> (f32, f32) {
    let near = |v: f32, max: f32| v >= -EDGE_TOLERANCE && v <= max + EDGE_TOLERANCE;
    if !(near(sx, max_x) && near(sy, max_y)) {
        return (f32::NAN, f32::NAN);
    }
    let clamp = |v: f32, max: f32| v.clamp(0.0, (max - EDGE_INSET).max(0.0));
    (clamp(sx, max_x), clamp(sy, max_y))
}
