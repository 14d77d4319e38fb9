use crate::foundation::core::{PixelPoint, Point, Rect};
use crate::foundation::error::{FrameError, FrameResult};

/// Twice-area threshold under which three corners count as collinear.
const COLLINEAR_EPS: f64 = 1e-6;

/// Four labeled corners of a frame opening.
///
/// Corner order is always `top_left, top_right, bottom_right, bottom_left`, i.e. clockwise
/// from the top-left in image space. That order is the destination basis of the homography,
/// so mislabeled corners mirror or rotate the warp rather than fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Quad {
    pub top_left: PixelPoint,
    pub top_right: PixelPoint,
    pub bottom_right: PixelPoint,
    pub bottom_left: PixelPoint,
}

impl Quad {
    pub fn new(
        top_left: PixelPoint,
        top_right: PixelPoint,
        bottom_right: PixelPoint,
        bottom_left: PixelPoint,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Build from corners already in `TL, TR, BR, BL` order.
    pub fn from_array(c: [PixelPoint; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    /// Axis-aligned rectangle `(x0,y0)..(x1,y1)` with inclusive corner coordinates.
    pub fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(
            PixelPoint::new(x0, y0),
            PixelPoint::new(x1, y0),
            PixelPoint::new(x1, y1),
            PixelPoint::new(x0, y1),
        )
    }

    pub fn corners(&self) -> [PixelPoint; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn points(&self) -> [Point; 4] {
        self.corners().map(PixelPoint::to_point)
    }

    /// Bounding box of the four corners.
    pub fn bounds(&self) -> Rect {
        let [a, b, c, d] = self.points();
        Rect::from_points(a, b).union_pt(c).union_pt(d)
    }

    /// Signed shoelace area. Positive for the expected clockwise (image-space) labeling.
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points())
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Reject coincident or collinear corners.
    pub fn ensure_non_degenerate(&self) -> FrameResult<()> {
        ensure_non_degenerate(&self.points())
    }
}

/// Source quadrilateral of a `width x height` raster: its own pixel corners in `TL, TR, BR, BL`
/// order.
pub fn source_corners(width: u32, height: u32) -> [Point; 4] {
    let w = f64::from(width.saturating_sub(1));
    let h = f64::from(height.saturating_sub(1));
    [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ]
}

pub fn signed_area(pts: &[Point; 4]) -> f64 {
    let mut acc = 0.0;
    for i in 0..4 {
        let p = pts[i];
        let q = pts[(i + 1) % 4];
        acc += p.x * q.y - q.x * p.y;
    }
    acc * 0.5
}

pub fn ensure_non_degenerate(pts: &[Point; 4]) -> FrameResult<()> {
    for i in 0..4 {
        for j in (i + 1)..4 {
            if pts[i] == pts[j] {
                return Err(FrameError::degenerate(format!(
                    "corners {i} and {j} coincide at ({}, {})",
                    pts[i].x, pts[i].y
                )));
            }
        }
    }

    // Any three collinear corners make the projective system rank-deficient.
    for skip in 0..4 {
        let tri: Vec<Point> = (0..4).filter(|&k| k != skip).map(|k| pts[k]).collect();
        let twice_area = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
        if twice_area.abs() <= COLLINEAR_EPS {
            return Err(FrameError::degenerate(format!(
                "three corners are collinear (all but corner {skip})"
            )));
        }
    }
    Ok(())
}
