use std::fmt;

use deploy_core::{LogLine, SessionError, StartOutcome};

use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("preflight failed: {0}")]
    Preflight(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("session driver is no longer running")]
    Stopped,
}

/// Answer to a start request, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartResponse {
    /// `None` when an accepted request came back without a status in its body.
    pub status_code: Option<u16>,
    pub message: Option<String>,
}

impl StartResponse {
    pub fn outcome(self) -> StartOutcome {
        match self.status_code {
            Some(code) => StartOutcome::from_status(code, self.message),
            None => StartOutcome::failed(self.message),
        }
    }
}

/// One page of the remote log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TailBatch {
    pub lines: Vec<LogLine>,
    /// Job state reported alongside the lines, when the server includes it.
    pub running: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcloneStatus {
    pub available: bool,
    pub path: Option<String>,
}

/// The whole remote log, for saving to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullLog {
    pub text: String,
    pub line_count: usize,
}
