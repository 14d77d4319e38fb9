use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use crate::foundation::error::{FrameError, FrameResult};
use crate::session::ledger::{ItemRecord, SessionId, SessionLedger};

/// File name of the persisted ledger inside a session directory.
pub const LEDGER_FILE: &str = "metadata.json";

/// Narrow persistence seam for session ledgers.
///
/// Ledgers are opened, appended to while the batch runs, and written exactly once at
/// `finalize`. `get` only ever returns finalized ledgers, so readers never observe a partially
/// written batch. Sessions are keyed independently; no state is shared between them.
pub trait LedgerStore: Send + Sync {
    /// Start tracking a new ledger (state `Created`); it moves to `Running` immediately.
    fn open(&self, ledger: SessionLedger) -> FrameResult<()>;
    /// Append one item record to a running ledger.
    fn append(&self, id: SessionId, record: ItemRecord) -> FrameResult<()>;
    /// Freeze counts, persist, and return the finalized ledger.
    fn finalize(&self, id: SessionId) -> FrameResult<SessionLedger>;
    /// Look up a finalized ledger.
    fn get(&self, id: SessionId) -> FrameResult<Option<SessionLedger>>;
    /// Drop a ledger that will never be finalized. Unknown ids are ignored.
    fn abort(&self, id: SessionId);
}

/// Ledgers still being appended to, keyed by session.
#[derive(Debug, Default)]
struct PendingLedgers {
    inner: Mutex<HashMap<SessionId, SessionLedger>>,
}

impl PendingLedgers {
    fn open(&self, mut ledger: SessionLedger) -> FrameResult<()> {
        ledger.begin()?;
        let id = ledger.session_id();
        let mut map = self.lock()?;
        if map.contains_key(&id) {
            return Err(FrameError::validation(format!("session {id} is already open")));
        }
        map.insert(id, ledger);
        Ok(())
    }

    fn append(&self, id: SessionId, record: ItemRecord) -> FrameResult<()> {
        let mut map = self.lock()?;
        let ledger = map
            .get_mut(&id)
            .ok_or_else(|| FrameError::validation(format!("session {id} is not open")))?;
        ledger.append(record)
    }

    fn take_finalized(&self, id: SessionId) -> FrameResult<SessionLedger> {
        let mut ledger = self
            .lock()?
            .remove(&id)
            .ok_or_else(|| FrameError::validation(format!("session {id} is not open")))?;
        ledger.finalize()?;
        Ok(ledger)
    }

    fn abort(&self, id: SessionId) {
        match self.inner.lock() {
            Ok(mut map) => {
                if map.remove(&id).is_some() {
                    tracing::debug!(session = %id, "pending ledger dropped");
                }
            }
            Err(_) => tracing::warn!(session = %id, "ledger store lock poisoned; abort skipped"),
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn lock(&self) -> FrameResult<std::sync::MutexGuard<'_, HashMap<SessionId, SessionLedger>>> {
        self.inner
            .lock()
            .map_err(|_| FrameError::validation("ledger store lock poisoned"))
    }
}

/// Stores each finalized ledger as `{root}/{session_id}/metadata.json`.
#[derive(Debug)]
pub struct FsLedgerStore {
    root: PathBuf,
    pending: PendingLedgers,
}

impl FsLedgerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending: PendingLedgers::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self, id: SessionId) -> PathBuf {
        self.root.join(id.to_string()).join(LEDGER_FILE)
    }

    /// Ledgers opened but not yet finalized or aborted.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl LedgerStore for FsLedgerStore {
    fn open(&self, ledger: SessionLedger) -> FrameResult<()> {
        self.pending.open(ledger)
    }

    fn append(&self, id: SessionId, record: ItemRecord) -> FrameResult<()> {
        self.pending.append(id, record)
    }

    fn finalize(&self, id: SessionId) -> FrameResult<SessionLedger> {
        let ledger = self.pending.take_finalized(id)?;
        let path = self.ledger_path(id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create session dir '{}'", dir.display()))?;
        }

        // Temp file + rename: `get` never observes a partial write.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, ledger.to_json_pretty()?)
            .with_context(|| format!("write ledger '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("move ledger into place '{}'", path.display()))?;

        tracing::info!(
            session = %id,
            processed = ledger.processed_count(),
            failed = ledger.failed_count(),
            path = %path.display(),
            "session ledger finalized"
        );
        Ok(ledger)
    }

    fn get(&self, id: SessionId) -> FrameResult<Option<SessionLedger>> {
        let path = self.ledger_path(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FrameError::io(format!(
                    "read ledger '{}': {e}",
                    path.display()
                )));
            }
        };
        SessionLedger::from_json(&raw).map(Some)
    }

    fn abort(&self, id: SessionId) {
        self.pending.abort(id);
    }
}

/// Keeps finalized ledgers in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    pending: PendingLedgers,
    finalized: Mutex<HashMap<SessionId, SessionLedger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledgers opened but not yet finalized or aborted.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn open(&self, ledger: SessionLedger) -> FrameResult<()> {
        self.pending.open(ledger)
    }

    fn append(&self, id: SessionId, record: ItemRecord) -> FrameResult<()> {
        self.pending.append(id, record)
    }

    fn finalize(&self, id: SessionId) -> FrameResult<SessionLedger> {
        let ledger = self.pending.take_finalized(id)?;
        self.finalized
            .lock()
            .map_err(|_| FrameError::validation("ledger store lock poisoned"))?
            .insert(id, ledger.clone());
        Ok(ledger)
    }

    fn get(&self, id: SessionId) -> FrameResult<Option<SessionLedger>> {
        Ok(self
            .finalized
            .lock()
            .map_err(|_| FrameError::validation("ledger store lock poisoned"))?
            .get(&id)
            .cloned())
    }

    fn abort(&self, id: SessionId) {
        self.pending.abort(id);
    }
}
