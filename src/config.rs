use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{FrameError, FrameResult};

/// On-disk layout for frames, batch results and the frame catalog.
///
/// Every field is optional in the JSON form; missing fields fall back to the defaults below.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Uploaded frame photos, coordinate files and overlay previews.
    pub frames_dir: PathBuf,
    /// One sub-directory per batch session.
    pub results_dir: PathBuf,
    /// Frame catalog JSON.
    pub catalog_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("storage/frames"),
            results_dir: PathBuf::from("storage/results"),
            catalog_path: PathBuf::from("database/frames.json"),
        }
    }
}

impl StorageConfig {
    pub fn from_path(path: &Path) -> FrameResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .map_err(|e| FrameError::serde(format!("parse config '{}': {e}", path.display())))?;
        Ok(cfg)
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(mut self, root: &Path) -> Self {
        for p in [
            &mut self.frames_dir,
            &mut self.results_dir,
            &mut self.catalog_path,
        ] {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        }
        self
    }

    pub fn ensure_dirs(&self) -> FrameResult<()> {
        let catalog_dir = self.catalog_path.parent().filter(|p| !p.as_os_str().is_empty());
        for dir in [Some(self.frames_dir.as_path()), Some(self.results_dir.as_path()), catalog_dir]
            .into_iter()
            .flatten()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create dir '{}'", dir.display()))?;
        }
        Ok(())
    }
}

/// Per-batch execution options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOpts {
    /// Composite items on a rayon pool. Ledger order still follows input order.
    pub parallel: bool,
    /// Worker count override (parallel mode only). Must be >= 1 when set.
    pub threads: Option<usize>,
}

impl BatchOpts {
    pub fn validate(&self) -> FrameResult<()> {
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(FrameError::validation(
                "batch 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}
