use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::assets::decode::{decode_image, load_image, save_image, sniff_extension};
use crate::foundation::core::{Canvas, PixelPoint};
use crate::foundation::error::{FrameError, FrameResult};
use crate::geometry::quad::Quad;
use crate::render::overlay::draw_corner_overlay;

/// One registered frame photo and, once picked, its opening corners.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameRecord {
    pub frame_id: String,
    pub frame_name: String,
    pub image_path: PathBuf,
    #[serde(default)]
    pub coordinates: Option<Quad>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FrameRecord {
    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Side-car written next to the frame photo when corners are saved.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CoordinatesFile {
    pub frame_id: String,
    pub image_path: PathBuf,
    pub image_dimensions: Canvas,
    pub corners: Quad,
    pub corners_array: [PixelPoint; 4],
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
struct CatalogDoc {
    frames: Vec<FrameRecord>,
}

/// JSON-file registry of frames.
///
/// Single writer: the whole file is rewritten on every `save`, with no locking between
/// processes.
#[derive(Clone, Debug)]
pub struct FrameCatalog {
    path: PathBuf,
    frames: Vec<FrameRecord>,
}

impl FrameCatalog {
    /// Load the catalog at `path`; a missing file is an empty catalog.
    pub fn load(path: impl Into<PathBuf>) -> FrameResult<Self> {
        let path = path.into();
        let frames = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let doc: CatalogDoc = serde_json::from_str(&raw).map_err(|e| {
                    FrameError::serde(format!("parse catalog '{}': {e}", path.display()))
                })?;
                doc.frames
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(FrameError::io(format!(
                    "read catalog '{}': {e}",
                    path.display()
                )));
            }
        };
        Ok(Self { path, frames })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> FrameResult<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create catalog dir '{}'", dir.display()))?;
        }
        let doc = CatalogDoc {
            frames: self.frames.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write catalog '{}'", self.path.display()))?;
        Ok(())
    }

    pub fn list(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn get(&self, frame_id: &str) -> Option<&FrameRecord> {
        self.frames.iter().find(|f| f.frame_id == frame_id)
    }

    pub fn require(&self, frame_id: &str) -> FrameResult<&FrameRecord> {
        self.get(frame_id)
            .ok_or_else(|| FrameError::precondition(format!("frame '{frame_id}' not found")))
    }

    /// Store a frame photo under `frames_dir` as `{frame_id}.{ext}` and add it to the catalog.
    ///
    /// The bytes must decode as an image. Call [`save`](Self::save) to persist the catalog.
    #[tracing::instrument(skip(self, frames_dir, bytes), fields(bytes = bytes.len()))]
    pub fn register(
        &mut self,
        frames_dir: &Path,
        frame_name: &str,
        bytes: &[u8],
    ) -> FrameResult<FrameRecord> {
        decode_image(bytes)?;
        let ext = sniff_extension(bytes)?;

        let frame_id = uuid::Uuid::new_v4().to_string();
        std::fs::create_dir_all(frames_dir)
            .with_context(|| format!("create frames dir '{}'", frames_dir.display()))?;
        let image_path = frames_dir.join(format!("{frame_id}.{ext}"));
        std::fs::write(&image_path, bytes)
            .with_context(|| format!("write frame image '{}'", image_path.display()))?;

        let record = FrameRecord {
            frame_id,
            frame_name: frame_name.to_string(),
            image_path,
            coordinates: None,
            coordinates_file: None,
            visual_file: None,
            updated_at: None,
        };
        self.frames.push(record.clone());
        tracing::info!(frame = %record.frame_id, "frame registered");
        Ok(record)
    }

    /// Attach corners to a frame, writing the coordinates side-car and an overlay preview.
    ///
    /// Degenerate corners are rejected here so they never reach a batch.
    #[tracing::instrument(skip(self, frames_dir))]
    pub fn set_corners(
        &mut self,
        frames_dir: &Path,
        frame_id: &str,
        quad: Quad,
    ) -> FrameResult<FrameRecord> {
        quad.ensure_non_degenerate()?;
        if !quad.is_clockwise() {
            tracing::warn!(frame = frame_id, "corners are not clockwise from top-left");
        }

        let idx = self
            .frames
            .iter()
            .position(|f| f.frame_id == frame_id)
            .ok_or_else(|| FrameError::precondition(format!("frame '{frame_id}' not found")))?;
        let image_path = self.frames[idx].image_path.clone();
        let background = load_image(&image_path)?;

        let now = Utc::now();
        let side_car = CoordinatesFile {
            frame_id: frame_id.to_string(),
            image_path: image_path.clone(),
            image_dimensions: Canvas::of(&background),
            corners: quad,
            corners_array: quad.corners(),
            created_at: now,
        };
        std::fs::create_dir_all(frames_dir)
            .with_context(|| format!("create frames dir '{}'", frames_dir.display()))?;
        let coordinates_file = frames_dir.join(format!("{frame_id}_coordinates.json"));
        std::fs::write(&coordinates_file, serde_json::to_string_pretty(&side_car)?)
            .with_context(|| format!("write coordinates '{}'", coordinates_file.display()))?;

        let visual_file = frames_dir.join(format!("{frame_id}_visual.png"));
        save_image(&draw_corner_overlay(&background, &quad), &visual_file)?;

        let record = &mut self.frames[idx];
        record.coordinates = Some(quad);
        record.coordinates_file = Some(coordinates_file);
        record.visual_file = Some(visual_file);
        record.updated_at = Some(now);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_catalog_loads_empty() {
        let path = std::env::temp_dir().join(format!(
            "artframe_catalog_missing_{}/frames.json",
            std::process::id()
        ));
        let cat = FrameCatalog::load(&path).unwrap();
        assert!(cat.list().is_empty());
        assert!(cat.get("nope").is_none());
        assert!(matches!(
            cat.require("nope"),
            Err(FrameError::Precondition(_))
        ));
    }

    #[test]
    fn record_json_matches_catalog_shape() {
        let rec = FrameRecord {
            frame_id: "f1".to_string(),
            frame_name: "oak".to_string(),
            image_path: PathBuf::from("storage/frames/f1.png"),
            coordinates: None,
            coordinates_file: None,
            visual_file: None,
            updated_at: None,
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["coordinates"], serde_json::Value::Null);
        assert!(v.get("visual_file").is_none());
        assert!(!rec.has_coordinates());
    }
}
