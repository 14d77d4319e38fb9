use crate::foundation::error::{FrameError, FrameResult};

pub use kurbo::{Point, Rect, Vec2};

/// Integer pixel position in image space (x grows right, y grows down).
///
/// Serialized as a two-element `[x, y]` array, the shape the corner picker emits.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct PixelPoint {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Promote to a floating-point point for transform math.
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl From<[i32; 2]> for PixelPoint {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<PixelPoint> for [i32; 2] {
    fn from(p: PixelPoint) -> Self {
        [p.x, p.y]
    }
}

impl std::str::FromStr for PixelPoint {
    type Err = FrameError;

    /// Parse `"x,y"`.
    fn from_str(s: &str) -> FrameResult<Self> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| FrameError::validation(format!("expected 'x,y', got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|e| FrameError::validation(format!("invalid coordinate '{v}': {e}")))
        };
        Ok(Self::new(parse(x)?, parse(y)?))
    }
}

/// Raster dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    pub fn of(img: &image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels, checked against overflow.
    pub fn pixel_count(self) -> FrameResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| FrameError::validation("canvas size overflow"))
    }
}
