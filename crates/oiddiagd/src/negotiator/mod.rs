//! Negotiator capability: the three protocol steps of a handshake.
//!
//! The diagnostician only sees this trait. Production code uses
//! `HttpNegotiator`, which talks to the real peer; tests and mock mode use
//! `FakeNegotiator` with pre-configured responses.

pub mod fake;
pub mod http;

use async_trait::async_trait;
use oiddiag_shared::{Association, DiagError, HandshakeOutcome, KeyExchange};

pub use fake::{FakeNegotiator, FakeNegotiatorBuilder, FakeStep};
pub use http::HttpNegotiator;

#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Discover the peer behind `identifier`.
    ///
    /// A peer that answers but refuses is `Ok(HandshakeOutcome::Failure)`;
    /// `Err` is reserved for transport and protocol breakage.
    async fn begin_handshake(&self, identifier: &str) -> Result<HandshakeOutcome, DiagError>;

    /// Build the association request body sent to the server endpoint.
    fn build_association_request(&self, kx: &KeyExchange) -> Result<String, DiagError>;

    /// Send the association request and decode the peer's answer.
    async fn fetch_association(
        &self,
        kx: &KeyExchange,
        endpoint: &str,
        body: &str,
    ) -> Result<Association, DiagError>;
}
