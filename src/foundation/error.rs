pub type FrameResult<T> = Result<T, FrameError>;

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("canvas mismatch: {0}")]
    CanvasMismatch(String),

    #[error("io failure: {0}")]
    Io(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FrameError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn canvas_mismatch(msg: impl Into<String>) -> Self {
        Self::CanvasMismatch(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Stable machine-readable kind, used when an error is flattened into a ledger record.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::Decode(_) => "decode",
            Self::DegenerateGeometry(_) => "degenerate_geometry",
            Self::CanvasMismatch(_) => "canvas_mismatch",
            Self::Io(_) => "io",
            Self::Validation(_) => "validation",
            Self::Serde(_) => "serde",
            Self::Other(_) => "other",
        }
    }
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}
