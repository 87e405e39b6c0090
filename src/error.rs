//! Error types for relay sessions and engine access

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Diagnostic details reported by the recognition engine
#[derive(Debug, Clone, Default)]
pub struct EngineDiagnostic {
    /// Engine-side error code, if one was provided
    pub code: Option<String>,
    /// Human-readable error message
    pub message: String,
    /// Engine request/task identifier for correlating server-side logs
    pub request_id: Option<String>,
}

impl std::fmt::Display for EngineDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.request_id) {
            (Some(code), Some(id)) => write!(f, "{} (code={}, request_id={})", self.message, code, id),
            (Some(code), None) => write!(f, "{} (code={})", self.message, code),
            (None, Some(id)) => write!(f, "{} (request_id={})", self.message, id),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl EngineDiagnostic {
    pub fn message<S: Into<String>>(msg: S) -> Self {
        Self {
            message: msg.into(),
            ..Self::default()
        }
    }
}

/// Errors scoped to a single relay session.
///
/// None of these terminate the server; a failing session drains what it can
/// and closes while sibling sessions keep running.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Engine failed to start: {0}")]
    EngineStart(String),

    #[error("Engine rejected audio: {0}")]
    EngineFeed(String),

    #[error("Engine runtime error: {0}")]
    Engine(EngineDiagnostic),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Client too slow: {0} events pending")]
    SlowClient(usize),

    #[error("Event queue is closed")]
    QueueClosed,
}
