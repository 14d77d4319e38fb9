use std::fmt;

use chrono::{DateTime, Utc};

use crate::foundation::error::{FrameError, FrameResult};

/// Globally unique identifier of one batch run.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Fresh random (v4) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = FrameError;

    fn from_str(s: &str) -> FrameResult<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| FrameError::validation(format!("invalid session id '{s}': {e}")))
    }
}

/// Where a composited image was stored: `{session_id}/{filename}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub session_id: SessionId,
    pub filename: String,
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.filename)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    Success { output: OutputRef },
    Failure { reason: String },
}

/// Result for one artwork item, in submission order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "ItemRecordRepr", try_from = "ItemRecordRepr")]
pub struct ItemRecord {
    pub original_filename: String,
    pub outcome: ItemOutcome,
}

impl ItemRecord {
    pub fn success(original_filename: impl Into<String>, output: OutputRef) -> Self {
        Self {
            original_filename: original_filename.into(),
            outcome: ItemOutcome::Success { output },
        }
    }

    pub fn failure(original_filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            original_filename: original_filename.into(),
            outcome: ItemOutcome::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Success { .. })
    }

    pub fn output(&self) -> Option<&OutputRef> {
        match &self.outcome {
            ItemOutcome::Success { output } => Some(output),
            ItemOutcome::Failure { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum StatusRepr {
    Success,
    Failed,
}

// Wire shape of an item record. The session id of an output is implied by the enclosing ledger
// and restored by `SessionLedger`'s deserializer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct ItemRecordRepr {
    original_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_filename: Option<String>,
    status: StatusRepr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    session_id: Option<SessionId>,
}

impl From<ItemRecord> for ItemRecordRepr {
    fn from(r: ItemRecord) -> Self {
        match r.outcome {
            ItemOutcome::Success { output } => Self {
                original_filename: r.original_filename,
                output_filename: Some(output.filename),
                status: StatusRepr::Success,
                error: None,
                session_id: Some(output.session_id),
            },
            ItemOutcome::Failure { reason } => Self {
                original_filename: r.original_filename,
                output_filename: None,
                status: StatusRepr::Failed,
                error: Some(reason),
                session_id: None,
            },
        }
    }
}

impl TryFrom<ItemRecordRepr> for ItemRecord {
    type Error = String;

    fn try_from(r: ItemRecordRepr) -> Result<Self, Self::Error> {
        match r.status {
            StatusRepr::Success => {
                let filename = r
                    .output_filename
                    .ok_or_else(|| "success record without output_filename".to_string())?;
                Ok(Self::success(
                    r.original_filename,
                    OutputRef {
                        // Placeholder; rebound to the ledger's session id after parsing.
                        session_id: r.session_id.unwrap_or(SessionId(uuid::Uuid::nil())),
                        filename,
                    },
                ))
            }
            StatusRepr::Failed => Ok(Self::failure(
                r.original_filename,
                r.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerState {
    Created,
    Running,
    Finalized,
}

/// Append-only record of one batch run.
///
/// `Created -> Running -> Finalized`. Records can only be appended while running; counts are
/// fixed at finalize and the ledger is read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLedger {
    session_id: SessionId,
    frame_id: String,
    created_at: DateTime<Utc>,
    results: Vec<ItemRecord>,
    processed_count: usize,
    failed_count: usize,
    state: LedgerState,
}

impl SessionLedger {
    pub fn new(session_id: SessionId, frame_id: impl Into<String>) -> Self {
        Self {
            session_id,
            frame_id: frame_id.into(),
            created_at: Utc::now(),
            results: Vec::new(),
            processed_count: 0,
            failed_count: 0,
            state: LedgerState::Created,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn results(&self) -> &[ItemRecord] {
        &self.results
    }

    /// Number of items composited and stored successfully.
    pub fn processed_count(&self) -> usize {
        self.processed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn begin(&mut self) -> FrameResult<()> {
        match self.state {
            LedgerState::Created => {
                self.state = LedgerState::Running;
                Ok(())
            }
            other => Err(FrameError::validation(format!(
                "ledger {} cannot begin from {other:?}",
                self.session_id
            ))),
        }
    }

    pub fn append(&mut self, record: ItemRecord) -> FrameResult<()> {
        if self.state != LedgerState::Running {
            return Err(FrameError::validation(format!(
                "ledger {} is {:?}; records can only be appended while running",
                self.session_id, self.state
            )));
        }
        if let Some(out) = record.output()
            && out.session_id != self.session_id
        {
            return Err(FrameError::validation(format!(
                "output '{out}' does not belong to session {}",
                self.session_id
            )));
        }
        if record.is_success() {
            self.processed_count += 1;
        } else {
            self.failed_count += 1;
        }
        self.results.push(record);
        Ok(())
    }

    pub fn finalize(&mut self) -> FrameResult<()> {
        if self.state != LedgerState::Running {
            return Err(FrameError::validation(format!(
                "ledger {} cannot finalize from {:?}",
                self.session_id, self.state
            )));
        }
        self.state = LedgerState::Finalized;
        Ok(())
    }

    /// Download references for every successful item, in submission order.
    pub fn download_paths(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(ItemRecord::output)
            .map(ToString::to_string)
            .collect()
    }

    pub fn to_json_pretty(&self) -> FrameResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> FrameResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SessionLedgerRepr {
    session_id: SessionId,
    frame_id: String,
    processed_count: usize,
    failed_count: usize,
    created_at: DateTime<Utc>,
    results: Vec<ItemRecord>,
}

impl serde::Serialize for SessionLedger {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SessionLedgerRepr {
            session_id: self.session_id,
            frame_id: self.frame_id.clone(),
            processed_count: self.processed_count,
            failed_count: self.failed_count,
            created_at: self.created_at,
            results: self.results.clone(),
        }
        .serialize(serializer)
    }
}

/// Persisted ledgers are always finalized; counts are recomputed from the records and must
/// agree with the stored values.
impl<'de> serde::Deserialize<'de> for SessionLedger {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        let repr = SessionLedgerRepr::deserialize(deserializer)?;
        let mut results = repr.results;
        for r in &mut results {
            if let ItemOutcome::Success { output } = &mut r.outcome {
                output.session_id = repr.session_id;
            }
        }
        let processed = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - processed;
        if processed != repr.processed_count || failed != repr.failed_count {
            return Err(D::Error::custom(format!(
                "ledger counts ({}, {}) disagree with records ({processed}, {failed})",
                repr.processed_count, repr.failed_count
            )));
        }

        Ok(Self {
            session_id: repr.session_id,
            frame_id: repr.frame_id,
            created_at: repr.created_at,
            results,
            processed_count: processed,
            failed_count: failed,
            state: LedgerState::Finalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(id: SessionId, name: &str) -> OutputRef {
        OutputRef {
            session_id: id,
            filename: name.to_string(),
        }
    }

    fn running(id: SessionId) -> SessionLedger {
        let mut l = SessionLedger::new(id, "frame-1");
        l.begin().unwrap();
        l
    }

    #[test]
    fn session_ids_are_unique_and_parse_back() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<SessionId>().unwrap(), a);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn lifecycle_is_enforced() {
        let id = SessionId::generate();
        let mut l = SessionLedger::new(id, "f");
        assert_eq!(l.state(), LedgerState::Created);
        assert!(l.append(ItemRecord::failure("a.png", "x")).is_err());
        assert!(l.finalize().is_err());

        l.begin().unwrap();
        assert!(l.begin().is_err());
        l.append(ItemRecord::success("a.png", out(id, "framed_a.png")))
            .unwrap();
        l.finalize().unwrap();
        assert_eq!(l.state(), LedgerState::Finalized);
        assert!(l.append(ItemRecord::failure("b.png", "x")).is_err());
        assert!(l.finalize().is_err());
    }

    #[test]
    fn counts_track_outcomes() {
        let id = SessionId::generate();
        let mut l = running(id);
        l.append(ItemRecord::success("a.png", out(id, "framed_a.png")))
            .unwrap();
        l.append(ItemRecord::failure("b.png", "decode error: bad"))
            .unwrap();
        l.append(ItemRecord::success("c.png", out(id, "framed_c.png")))
            .unwrap();
        assert_eq!(l.processed_count(), 2);
        assert_eq!(l.failed_count(), 1);
        assert_eq!(
            l.download_paths(),
            vec![format!("{id}/framed_a.png"), format!("{id}/framed_c.png")]
        );
    }

    #[test]
    fn foreign_output_is_rejected() {
        let mut l = running(SessionId::generate());
        let other = SessionId::generate();
        assert!(
            l.append(ItemRecord::success("a.png", out(other, "framed_a.png")))
                .is_err()
        );
        assert!(l.results().is_empty());
    }

    #[test]
    fn json_uses_status_strings() {
        let id = SessionId::generate();
        let mut l = running(id);
        l.append(ItemRecord::success("a.png", out(id, "framed_a.png")))
            .unwrap();
        l.append(ItemRecord::failure("b.png", "boom")).unwrap();
        l.finalize().unwrap();

        let v: serde_json::Value = serde_json::from_str(&l.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["session_id"], serde_json::json!(id.to_string()));
        assert_eq!(v["frame_id"], "frame-1");
        assert_eq!(v["processed_count"], 1);
        assert_eq!(v["failed_count"], 1);
        assert!(v["created_at"].is_string());
        assert_eq!(
            v["results"][0],
            serde_json::json!({
                "original_filename": "a.png",
                "output_filename": "framed_a.png",
                "status": "success",
            })
        );
        assert_eq!(
            v["results"][1],
            serde_json::json!({
                "original_filename": "b.png",
                "status": "failed",
                "error": "boom",
            })
        );
    }

    #[test]
    fn parsed_ledger_is_finalized_and_rebinds_outputs() {
        let id = SessionId::generate();
        let mut l = running(id);
        l.append(ItemRecord::success("a.png", out(id, "framed_a.png")))
            .unwrap();
        l.finalize().unwrap();

        let back = SessionLedger::from_json(&l.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, l);
        assert_eq!(back.results()[0].output().unwrap().session_id, id);
    }

    #[test]
    fn parsed_ledger_with_wrong_counts_is_rejected() {
        let id = SessionId::generate();
        let raw = serde_json::json!({
            "session_id": id.to_string(),
            "frame_id": "f",
            "processed_count": 3,
            "failed_count": 0,
            "created_at": "2024-01-01T00:00:00Z",
            "results": [],
        });
        assert!(SessionLedger::from_json(&raw.to_string()).is_err());
    }
}
