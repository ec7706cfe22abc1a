//! Error types for the Chicory engine

use crate::action::ActionKind;
use crate::geometry::GeometryError;
use std::fmt;
use thiserror::Error;

/// Body of a failed backend response.
///
/// The backend answers errors either with a JSON document (FastAPI style
/// `{"detail": "..."}`) or with plain text; both are kept as received.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Structured(serde_json::Value),
    Text(String),
    Empty,
}

impl ErrorBody {
    /// Parse a raw response body, preferring JSON when it parses.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => Self::Structured(value),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    /// Short human-readable message extracted from the body.
    pub fn message(&self) -> String {
        match self {
            Self::Structured(value) => ["detail", "error", "message"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            Self::Text(text) => text.clone(),
            Self::Empty => "<empty body>".to_string(),
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Failure of a single request to the automation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: ErrorBody,
    },

    #[error("{endpoint} reported failure: {body}")]
    Rejected { endpoint: String, body: ErrorBody },
}

impl BackendError {
    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                source: err,
            }
        }
    }

    /// The backend endpoint the failed request targeted.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint }
            | Self::Status { endpoint, .. }
            | Self::Rejected { endpoint, .. } => endpoint,
        }
    }
}

/// Errors produced while executing a plan or running the analyze pipeline.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Liveness retries exhausted; no action was attempted.
    #[error("automation backend unavailable after {attempts} attempts")]
    BackendUnavailable { attempts: u32 },

    /// A pointer or typing action has no bounding box to aim at.
    #[error("action #{index} ({kind}) cannot be grounded: {reason}")]
    UngroundedAction {
        index: usize,
        kind: ActionKind,
        reason: String,
    },

    /// The backend answered a dispatched request with a failure.
    #[error("action #{index} ({kind}) failed: {source}")]
    BackendRequestFailed {
        index: usize,
        kind: ActionKind,
        #[source]
        source: BackendError,
    },

    /// A bounding box or scale factor that cannot be transformed.
    #[error("action #{index} ({kind}) has invalid geometry: {source}")]
    InvalidGeometry {
        index: usize,
        kind: ActionKind,
        #[source]
        source: GeometryError,
    },

    /// A raw action that does not describe one of the supported kinds.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("execution cancelled{}", .index.map(|i| format!(" at action #{i}")).unwrap_or_default())]
    Cancelled { index: Option<usize> },

    #[error("capture error: {0}")]
    Capture(String),

    #[error("reasoning service error: {0}")]
    Reasoning(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AutomationError {
    /// Index of the action the failure is attributed to, when there is one.
    pub fn action_index(&self) -> Option<usize> {
        match self {
            Self::UngroundedAction { index, .. }
            | Self::BackendRequestFailed { index, .. }
            | Self::InvalidGeometry { index, .. } => Some(*index),
            Self::Cancelled { index } => *index,
            _ => None,
        }
    }

    /// Kind of the action the failure is attributed to, when there is one.
    pub fn action_kind(&self) -> Option<ActionKind> {
        match self {
            Self::UngroundedAction { kind, .. }
            | Self::BackendRequestFailed { kind, .. }
            | Self::InvalidGeometry { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The underlying backend error, for failures caused by one.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::BackendRequestFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
