use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;

use crate::assets::decode::save_image;
use crate::foundation::error::{FrameError, FrameResult};
use crate::session::ledger::OutputRef;

/// Destination for composited images, keyed by `(session_id, filename)`.
pub trait OutputStore: Send + Sync {
    fn write(&self, out: &OutputRef, image: &RgbImage) -> FrameResult<()>;
}

/// Writes `{root}/{session_id}/{filename}`, encoding by the filename's extension.
#[derive(Clone, Debug)]
pub struct FsOutputStore {
    root: PathBuf,
}

impl FsOutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, out: &OutputRef) -> PathBuf {
        self.root
            .join(out.session_id.to_string())
            .join(&out.filename)
    }
}

impl OutputStore for FsOutputStore {
    fn write(&self, out: &OutputRef, image: &RgbImage) -> FrameResult<()> {
        save_image(image, &self.path_for(out))
    }
}

/// Keeps outputs in memory; handy for tests and previews.
#[derive(Debug, Default)]
pub struct InMemoryOutputStore {
    images: Mutex<BTreeMap<OutputRef, RgbImage>>,
}

impl InMemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, out: &OutputRef) -> Option<RgbImage> {
        self.images.lock().ok()?.get(out).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputStore for InMemoryOutputStore {
    fn write(&self, out: &OutputRef, image: &RgbImage) -> FrameResult<()> {
        self.images
            .lock()
            .map_err(|_| FrameError::io("output store lock poisoned"))?
            .insert(out.clone(), image.clone());
        Ok(())
    }
}
