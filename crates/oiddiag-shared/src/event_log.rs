//! Diagnostic event log: the timeline of one diagnostic run.
//!
//! Append-only. Events are never edited once pushed; their sequence index is
//! their position in the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::association::Association;
use crate::error::DiagError;
use crate::handshake::HandshakeContext;

/// Handshake step an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Begin,
    AssociateRequest,
    AssociateFetch,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::AssociateRequest => write!(f, "associate_request"),
            Self::AssociateFetch => write!(f, "associate_fetch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Success,
    Failure,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "ok"),
            Self::Failure => write!(f, "FAILED"),
        }
    }
}

/// Failure taxonomy as recorded on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    HandshakeFailure,
    ProtocolError,
    TransportError,
    Timeout,
}

impl FailureKind {
    pub fn from_error(err: &DiagError) -> Self {
        match err {
            DiagError::HandshakeFailure(_) => Self::HandshakeFailure,
            DiagError::Transport(_) => Self::TransportError,
            DiagError::Timeout { .. } => Self::Timeout,
            _ => Self::ProtocolError,
        }
    }
}

/// What an event carries besides its label.
///
/// WIRE COMPATIBILITY: new payload types go before `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Handshake {
        token: String,
        identity_url: String,
        server_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delegate: Option<String>,
    },
    AssociationRequest {
        body: String,
    },
    /// Association metadata; the secret appears only as a fingerprint
    Association {
        handle: String,
        assoc_type: String,
        expires_at: DateTime<Utc>,
        lifetime_secs: u64,
        secret_fingerprint: String,
    },
    Failure {
        kind: FailureKind,
        cause: String,
    },
    #[serde(other)]
    Unknown,
}

/// A single timeline entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub step: Step,
    pub status: EventStatus,
    pub label: String,
    /// Milliseconds since the run started
    pub elapsed_ms: u64,
    pub at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl DiagnosticEvent {
    fn new(step: Step, status: EventStatus, label: String, elapsed_ms: u64, payload: EventPayload) -> Self {
        Self {
            step,
            status,
            label,
            elapsed_ms,
            at: Utc::now(),
            payload,
        }
    }

    pub fn handshake_started(elapsed_ms: u64, ctx: &HandshakeContext) -> Self {
        Self::new(
            Step::Begin,
            EventStatus::Success,
            format!("Discovered server {}", ctx.server_url),
            elapsed_ms,
            EventPayload::Handshake {
                token: ctx.token.clone(),
                identity_url: ctx.identity_url.clone(),
                server_url: ctx.server_url.clone(),
                delegate: ctx.delegate.clone(),
            },
        )
    }

    pub fn association_requested(elapsed_ms: u64, body: impl Into<String>) -> Self {
        Self::new(
            Step::AssociateRequest,
            EventStatus::Success,
            "Built association request".to_string(),
            elapsed_ms,
            EventPayload::AssociationRequest { body: body.into() },
        )
    }

    pub fn association_fetched(elapsed_ms: u64, assoc: &Association) -> Self {
        Self::new(
            Step::AssociateFetch,
            EventStatus::Success,
            format!("Associated with handle {}", assoc.handle),
            elapsed_ms,
            EventPayload::Association {
                handle: assoc.handle.clone(),
                assoc_type: assoc.assoc_type.clone(),
                expires_at: assoc.expires_at(),
                lifetime_secs: assoc.lifetime_secs,
                secret_fingerprint: assoc.fingerprint(),
            },
        )
    }

    /// Discovery completed but the peer refused the handshake.
    pub fn handshake_refused(elapsed_ms: u64, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            Step::Begin,
            EventStatus::Failure,
            "Handshake refused".to_string(),
            elapsed_ms,
            EventPayload::Failure {
                kind: FailureKind::HandshakeFailure,
                cause: reason,
            },
        )
    }

    pub fn step_failed(step: Step, elapsed_ms: u64, err: &DiagError) -> Self {
        Self::new(
            step,
            EventStatus::Failure,
            format!("Step {} failed", step),
            elapsed_ms,
            EventPayload::Failure {
                kind: FailureKind::from_error(err),
                cause: err.to_string(),
            },
        )
    }

    pub fn is_failure(&self) -> bool {
        self.status == EventStatus::Failure
    }
}

/// Ordered events of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<DiagnosticEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiagnosticEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&DiagnosticEvent> {
        self.events.last()
    }

    pub fn has_failure(&self) -> bool {
        self.events.iter().any(DiagnosticEvent::is_failure)
    }

    pub fn steps(&self) -> Vec<Step> {
        self.events.iter().map(|e| e.step).collect()
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a DiagnosticEvent;
    type IntoIter = std::slice::Iter<'a, DiagnosticEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HandshakeContext {
        HandshakeContext {
            token: "token".to_string(),
            identity_url: "http://unittest.example/joe".to_string(),
            server_url: "http://unittest.example/server".to_string(),
            delegate: None,
            nonce: "nonce".to_string(),
        }
    }

    #[test]
    fn test_push_preserves_order() {
        let mut log = EventLog::new();
        log.push(DiagnosticEvent::handshake_started(0, &context()));
        log.push(DiagnosticEvent::association_requested(5, "body"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.steps(), vec![Step::Begin, Step::AssociateRequest]);
        assert!(!log.has_failure());
    }

    #[test]
    fn test_association_payload_hides_secret() {
        let assoc = Association::from_expires_in(3600, "assoc handle", "s3krit", "HMAC-SHA1");
        let event = DiagnosticEvent::association_fetched(10, &assoc);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("assoc handle"));
        assert!(json.contains(&assoc.fingerprint()));
        assert!(!json.contains("s3krit"));
    }

    #[test]
    fn test_failure_kind_mapping() {
        let event = DiagnosticEvent::step_failed(
            Step::AssociateFetch,
            1,
            &DiagError::Timeout {
                step: "associate_fetch".to_string(),
                after_ms: 100,
            },
        );
        assert!(event.is_failure());
        match event.payload {
            EventPayload::Failure { kind, .. } => assert_eq!(kind, FailureKind::Timeout),
            other => panic!("Expected failure payload, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_payload_tolerated() {
        let json = r#"{"type":"something_new","extra":1}"#;
        let payload: EventPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload, EventPayload::Unknown);
    }
}
