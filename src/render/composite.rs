use image::{GrayImage, RgbImage};

use crate::assets::decode::decode_image;
use crate::foundation::core::Canvas;
use crate::foundation::error::{FrameError, FrameResult};
use crate::geometry::homography::Homography;
use crate::geometry::quad::{Quad, source_corners};
use crate::render::mask::{MASK_OFF, quad_mask};
use crate::render::warp::warp_perspective;

/// Decode `artwork_bytes` and composite it into `quad` on a copy of `background`.
pub fn composite_bytes(
    artwork_bytes: &[u8],
    quad: &Quad,
    background: &RgbImage,
) -> FrameResult<RgbImage> {
    let artwork = decode_image(artwork_bytes)?;
    composite(&artwork, quad, background)
}

/// Perspective-warp `artwork` so its corners land on `quad` and paste it over a copy of
/// `background`, restricted to the quad's pixel mask.
///
/// Artwork corners map in `TL, TR, BR, BL` order onto the quad's labeled corners. The
/// background is never modified.
#[tracing::instrument(
    level = "debug",
    skip(artwork, background),
    fields(
        artwork_w = artwork.width(),
        artwork_h = artwork.height(),
        canvas_w = background.width(),
        canvas_h = background.height()
    )
)]
pub fn composite(artwork: &RgbImage, quad: &Quad, background: &RgbImage) -> FrameResult<RgbImage> {
    if artwork.width() == 0 || artwork.height() == 0 {
        return Err(FrameError::decode("artwork raster is empty"));
    }
    let canvas = Canvas::of(background);
    if canvas.is_empty() {
        return Err(FrameError::canvas_mismatch("background raster is empty"));
    }
    if !quad.is_clockwise() {
        tracing::warn!(?quad, "corners are not clockwise from top-left; warp will be mirrored");
    }

    let src = source_corners(artwork.width(), artwork.height());
    let h = Homography::from_quads(&src, &quad.points())?;
    let warped = warp_perspective(artwork, &h, canvas)?;
    let mask = quad_mask(quad, canvas)?;

    let mut out = background.clone();
    apply_masked(&mut out, &warped, &mask)?;
    Ok(out)
}

/// Copy `src` pixels into `dst` wherever `mask` is on.
pub fn apply_masked(dst: &mut RgbImage, src: &RgbImage, mask: &GrayImage) -> FrameResult<()> {
    if dst.dimensions() != src.dimensions() || dst.dimensions() != mask.dimensions() {
        return Err(FrameError::canvas_mismatch(format!(
            "apply_masked expects equal sizes (dst {:?}, src {:?}, mask {:?})",
            dst.dimensions(),
            src.dimensions(),
            mask.dimensions()
        )));
    }
    for ((d, s), m) in dst
        .chunks_exact_mut(3)
        .zip(src.as_raw().chunks_exact(3))
        .zip(mask.as_raw().iter())
    {
        if *m != MASK_OFF {
            d.copy_from_slice(s);
        }
    }
    Ok(())
}
