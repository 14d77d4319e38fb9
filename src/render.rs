pub mod composite;
pub mod mask;
pub mod overlay;
pub mod warp;
