use std::path::Path;

use image::RgbImage;
use rayon::prelude::*;

use crate::config::BatchOpts;
use crate::foundation::error::{FrameError, FrameResult};
use crate::geometry::quad::Quad;
use crate::render::composite::composite_bytes;
use crate::session::ledger::{ItemRecord, OutputRef, SessionId, SessionLedger};
use crate::session::output::OutputStore;
use crate::session::store::LedgerStore;

/// Prefix of every generated output filename.
pub const OUTPUT_PREFIX: &str = "framed_";

/// One uploaded artwork: its original filename and undecoded bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtworkItem {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ArtworkItem {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> FrameResult<Self> {
        let filename = file_name_of(path)?;
        let bytes = std::fs::read(path)
            .map_err(|e| FrameError::io(format!("read artwork '{}': {e}", path.display())))?;
        Ok(Self { filename, bytes })
    }

    /// Placeholder for a file that could not be read. It carries no bytes, so the batch records
    /// it as a decode failure under the same name a readable file would get.
    pub fn unreadable(path: &Path) -> Self {
        Self {
            filename: file_name_of(path).unwrap_or_else(|_| path.to_string_lossy().into_owned()),
            bytes: Vec::new(),
        }
    }
}

fn file_name_of(path: &Path) -> FrameResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FrameError::validation(format!("'{}' has no file name", path.display())))
}

/// Output filename for an upload: `framed_` + the upload's final path component.
pub fn output_filename(original: &str) -> FrameResult<String> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(FrameError::validation(format!(
            "artwork filename '{original}' has no usable file name"
        )));
    }
    Ok(format!("{OUTPUT_PREFIX}{base}"))
}

/// Composites one frame against a batch of artwork items.
///
/// Each item is attempted exactly once. Per-item failures are recorded in the ledger and never
/// abort the batch; only a missing quad (or a ledger store failure) is returned as an error.
pub struct BatchRunner<'a> {
    outputs: &'a dyn OutputStore,
    ledgers: &'a dyn LedgerStore,
    opts: BatchOpts,
}

impl<'a> BatchRunner<'a> {
    pub fn new(outputs: &'a dyn OutputStore, ledgers: &'a dyn LedgerStore) -> Self {
        Self {
            outputs,
            ledgers,
            opts: BatchOpts::default(),
        }
    }

    pub fn with_opts(mut self, opts: BatchOpts) -> Self {
        self.opts = opts;
        self
    }

    #[tracing::instrument(
        skip(self, quad, background, items),
        fields(items = items.len(), parallel = self.opts.parallel)
    )]
    pub fn run_batch(
        &self,
        frame_id: &str,
        quad: Option<&Quad>,
        background: &RgbImage,
        items: &[ArtworkItem],
    ) -> FrameResult<SessionLedger> {
        let quad = quad.ok_or_else(|| FrameError::precondition("coordinates not set"))?;
        if background.width() == 0 || background.height() == 0 {
            return Err(FrameError::precondition("background image is empty"));
        }
        self.opts.validate()?;
        let pool = if self.opts.parallel {
            Some(build_thread_pool(self.opts.threads)?)
        } else {
            None
        };

        let session_id = SessionId::generate();
        self.ledgers.open(SessionLedger::new(session_id, frame_id))?;
        tracing::debug!(session = %session_id, "batch started");

        let records: Vec<ItemRecord> = match &pool {
            Some(pool) => pool.install(|| {
                items
                    .par_iter()
                    .map(|item| self.process_item(session_id, quad, background, item))
                    .collect()
            }),
            None => items
                .iter()
                .map(|item| self.process_item(session_id, quad, background, item))
                .collect(),
        };

        let finished = records
            .into_iter()
            .try_for_each(|record| self.ledgers.append(session_id, record))
            .and_then(|()| self.ledgers.finalize(session_id));
        if let Err(e) = &finished {
            tracing::warn!(session = %session_id, error = %e, "ledger not finalized; session dropped");
            self.ledgers.abort(session_id);
        }
        finished
    }

    fn process_item(
        &self,
        session_id: SessionId,
        quad: &Quad,
        background: &RgbImage,
        item: &ArtworkItem,
    ) -> ItemRecord {
        match self.try_item(session_id, quad, background, item) {
            Ok(output) => {
                tracing::debug!(file = %item.filename, output = %output, "item composited");
                ItemRecord::success(item.filename.clone(), output)
            }
            Err(e) => {
                tracing::warn!(
                    file = %item.filename,
                    kind = e.kind(),
                    error = %e,
                    "item failed"
                );
                ItemRecord::failure(item.filename.clone(), e.to_string())
            }
        }
    }

    fn try_item(
        &self,
        session_id: SessionId,
        quad: &Quad,
        background: &RgbImage,
        item: &ArtworkItem,
    ) -> FrameResult<OutputRef> {
        let output = OutputRef {
            session_id,
            filename: output_filename(&item.filename)?,
        };
        let framed = composite_bytes(&item.bytes, quad, background)?;
        self.outputs.write(&output, &framed)?;
        Ok(output)
    }
}

fn build_thread_pool(threads: Option<usize>) -> FrameResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| FrameError::validation(format!("failed to build rayon thread pool: {e}")))
}
