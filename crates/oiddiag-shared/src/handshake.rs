//! Handshake capability types exchanged with a negotiator.

use serde::{Deserialize, Serialize};

/// Association type requested when nothing else is configured
pub const DEFAULT_ASSOC_TYPE: &str = "HMAC-SHA1";

/// State carried from discovery into the association steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeContext {
    pub token: String,
    /// Identifier after normalisation
    pub identity_url: String,
    /// Endpoint the association request goes to
    pub server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<String>,
    pub nonce: String,
}

/// Result of the discovery step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Success(HandshakeContext),
    Failure { reason: String },
}

impl HandshakeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Key-exchange parameters for the association steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchange {
    pub assoc_type: String,
    /// `None` asks the peer for an unencrypted session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
}

impl KeyExchange {
    pub fn new(assoc_type: impl Into<String>, session_type: Option<String>) -> Self {
        Self {
            assoc_type: assoc_type.into(),
            session_type,
        }
    }

    pub fn plaintext() -> Self {
        Self::new(DEFAULT_ASSOC_TYPE, None)
    }
}

impl Default for KeyExchange {
    fn default() -> Self {
        Self::plaintext()
    }
}
