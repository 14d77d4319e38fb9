pub mod homography;
pub mod quad;
