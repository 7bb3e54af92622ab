//! Shared types for the OpenID handshake diagnostician.
//!
//! Data model and pure logic used by both the daemon and the CLI:
//! attempt ledgers, diagnostic event logs, association values and the
//! request-glue interface the daemon dispatches through.

pub mod association;
pub mod error;
pub mod event_log;
pub mod handshake;
pub mod kvform;
pub mod ledger;
pub mod render;
pub mod request;
pub mod rpc;

pub use association::Association;
pub use error::DiagError;
pub use event_log::{DiagnosticEvent, EventLog, EventPayload, EventStatus, Step};
pub use handshake::{HandshakeContext, HandshakeOutcome, KeyExchange};
pub use ledger::{Attempt, AttemptLedger, FailureCause, LedgerSummary, Outcome};
pub use request::{BufferedRequest, DiagRequest, Severity};

/// Crate version, shared by the daemon and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request field naming the action to dispatch on a test.
pub const ACTION_FIELD: &str = "action";

/// Request field carrying the identifier to diagnose.
pub const IDENTIFIER_FIELD: &str = "openid_url";
