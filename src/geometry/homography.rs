use imageproc::geometric_transformations::Projection;

use crate::foundation::core::Point;
use crate::foundation::error::{FrameError, FrameResult};
use crate::geometry::quad::ensure_non_degenerate;

/// Planar projective transform fitted to four point correspondences.
#[derive(Clone, Copy, Debug)]
pub struct Homography {
    projection: Projection,
}

impl Homography {
    /// Fit the homography taking `src[i]` to `dst[i]`.
    ///
    /// Both point sets must be free of coincident and collinear triples; with that
    /// guaranteed the fit is unique and invertible.
    pub fn from_quads(src: &[Point; 4], dst: &[Point; 4]) -> FrameResult<Self> {
        ensure_non_degenerate(src).map_err(|_| {
            FrameError::degenerate("source corners collapse (artwork needs at least 2x2 pixels)")
        })?;
        ensure_non_degenerate(dst)?;

        let projection = Projection::from_control_points(to_pairs(src), to_pairs(dst))
            .ok_or_else(|| FrameError::degenerate("perspective transform is not invertible"))?;
        Ok(Self { projection })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn inverse(&self) -> Self {
        Self {
            projection: self.projection.invert(),
        }
    }

    /// Map a point. `None` when it lands on the line at infinity.
    pub fn project(&self, p: Point) -> Option<Point> {
        let (x, y) = self.projection * (p.x as f32, p.y as f32);
        (x.is_finite() && y.is_finite()).then(|| Point::new(f64::from(x), f64::from(y)))
    }
}

fn to_pairs(pts: &[Point; 4]) -> [(f32, f32); 4] {
    pts.map(|p| (p.x as f32, p.y as f32))
}
