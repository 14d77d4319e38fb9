use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::geometry::quad::Quad;

pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLINE_HALF_WIDTH: i32 = 1;
const MARKER_RADIUS: i32 = 10;

/// Preview of the selected opening: outline plus a filled marker on every corner.
pub fn draw_corner_overlay(background: &RgbImage, quad: &Quad) -> RgbImage {
    let mut out = background.clone();
    let corners = quad.corners();

    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        for dy in -OUTLINE_HALF_WIDTH..=OUTLINE_HALF_WIDTH {
            for dx in -OUTLINE_HALF_WIDTH..=OUTLINE_HALF_WIDTH {
                draw_line_segment_mut(
                    &mut out,
                    ((a.x + dx) as f32, (a.y + dy) as f32),
                    ((b.x + dx) as f32, (b.y + dy) as f32),
                    OVERLAY_COLOR,
                );
            }
        }
    }

    for c in corners {
        draw_filled_circle_mut(&mut out, (c.x, c.y), MARKER_RADIUS, OVERLAY_COLOR);
    }
    out
}
