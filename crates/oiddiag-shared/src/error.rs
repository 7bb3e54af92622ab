//! Error types for the diagnostician.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagError {
    #[error("Handshake failure: {0}")]
    HandshakeFailure(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Step '{step}' timed out after {after_ms}ms")]
    Timeout { step: String, after_ms: u64 },

    #[error("Attempt #{ordinal} is already resolved")]
    InvalidState { ordinal: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing request field: {0}")]
    MissingField(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl DiagError {
    pub fn code(&self) -> i32 {
        match self {
            DiagError::HandshakeFailure(_) => -32010,
            DiagError::Protocol(_) => -32011,
            DiagError::Transport(_) => -32012,
            DiagError::Timeout { .. } => -32013,
            DiagError::InvalidState { .. } => -32020,
            DiagError::NotFound(_) => -32601,
            DiagError::MissingField(_) => -32602,
            DiagError::Config(_) => -32030,
        }
    }
}
