//! Error types shared by the engine layers

use thiserror::Error;

/// Failure raised by the remote automation capability.
///
/// Every variant is contained within a single step: the step executor records it
/// as a `capability_error` observation and the task runner decides what to do next.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("session is no longer valid: {0}")]
    SessionInvalid(String),

    #[error("rate limited by automation capability")]
    RateLimited,

    #[error("capability returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed capability response: {0}")]
    Protocol(String),

    #[error("capability error: {0}")]
    Capability(String),
}

impl From<reqwest::Error> for AutomationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AutomationError::Protocol(err.to_string())
        } else {
            AutomationError::Transport(err.to_string())
        }
    }
}

/// Run-level failures. Anything below `FatalStartup` stays inside its test case.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot acquire a browser session: {0}")]
    FatalStartup(String),

    #[error("automation capability unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("duplicate test case: {persona} / {task}")]
    DuplicateTestCase { persona: String, task: String },

    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Persistence failures of the RunState artifact
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("refusing to overwrite checkpoint #{last_seq} ({last_sealed} sealed) with older state #{seq} ({sealed} sealed)")]
    Regression {
        last_seq: u64,
        last_sealed: usize,
        seq: u64,
        sealed: usize,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
