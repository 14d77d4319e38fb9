use std::path::Path;

use anyhow::Context;
use image::{ImageFormat, RgbImage};

use crate::foundation::error::{FrameError, FrameResult};

/// Decode an uploaded raster into 8-bit RGB. Alpha, if any, is dropped.
pub fn decode_image(bytes: &[u8]) -> FrameResult<RgbImage> {
    if bytes.is_empty() {
        return Err(FrameError::decode("empty image buffer"));
    }
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| FrameError::decode(format!("decode image from memory: {e}")))?;
    let rgb = dyn_img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(FrameError::decode("image has zero width or height"));
    }
    Ok(rgb)
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> FrameResult<RgbImage> {
    let bytes = std::fs::read(path)
        .map_err(|e| FrameError::io(format!("read image '{}': {e}", path.display())))?;
    decode_image(&bytes)
}

/// File extension matching the container format sniffed from `bytes`.
pub fn sniff_extension(bytes: &[u8]) -> FrameResult<&'static str> {
    let format = image::guess_format(bytes)
        .map_err(|e| FrameError::decode(format!("unrecognized image format: {e}")))?;
    format
        .extensions_str()
        .first()
        .copied()
        .ok_or_else(|| FrameError::decode(format!("no file extension for {format:?}")))
}

/// Encode `img` to `path`, picking the format from the extension.
pub fn save_image(img: &RgbImage, path: &Path) -> FrameResult<()> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        FrameError::io(format!(
            "no image format for output '{}': {e}",
            path.display()
        ))
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save_with_format(path, format)
        .map_err(|e| FrameError::io(format!("write image '{}': {e}", path.display())))
}
