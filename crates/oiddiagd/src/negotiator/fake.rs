//! Fake negotiator for deterministic testing and mock mode.

use async_trait::async_trait;
use oiddiag_shared::{Association, DiagError, HandshakeContext, HandshakeOutcome, KeyExchange};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::Negotiator;

pub const FAKE_REQUEST_BODY: &str = "kvform association request";

/// Negotiator step, for call counting and scripted failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeStep {
    Begin,
    BuildRequest,
    Fetch,
}

#[derive(Debug, Clone)]
enum Fault {
    Error(FaultError),
    Delay(Duration),
}

#[derive(Debug, Clone)]
enum FaultError {
    Protocol(String),
    Transport(String),
}

impl FaultError {
    fn to_error(&self) -> DiagError {
        match self {
            FaultError::Protocol(msg) => DiagError::Protocol(msg.clone()),
            FaultError::Transport(msg) => DiagError::Transport(msg.clone()),
        }
    }
}

/// Negotiator returning canned answers without any network I/O
pub struct FakeNegotiator {
    server_url: String,
    refusal: Option<String>,
    faults: HashMap<FakeStep, Fault>,
    association: Association,
    call_counts: Arc<Mutex<HashMap<FakeStep, usize>>>,
}

impl FakeNegotiator {
    pub fn new() -> Self {
        FakeNegotiatorBuilder::new().build()
    }

    pub fn call_count(&self, step: FakeStep) -> usize {
        self.call_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&step)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.call_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    fn record(&self, step: FakeStep) {
        let mut counts = self.call_counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(step).or_insert(0) += 1;
    }

    async fn apply_fault(&self, step: FakeStep) -> Result<(), DiagError> {
        match self.faults.get(&step) {
            Some(Fault::Error(err)) => Err(err.to_error()),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Default for FakeNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Negotiator for FakeNegotiator {
    async fn begin_handshake(&self, identifier: &str) -> Result<HandshakeOutcome, DiagError> {
        self.record(FakeStep::Begin);
        self.apply_fault(FakeStep::Begin).await?;

        if let Some(reason) = &self.refusal {
            return Ok(HandshakeOutcome::Failure {
                reason: reason.clone(),
            });
        }
        Ok(HandshakeOutcome::Success(HandshakeContext {
            token: "token".to_string(),
            identity_url: identifier.to_string(),
            server_url: self.server_url.clone(),
            delegate: None,
            nonce: "nonce".to_string(),
        }))
    }

    fn build_association_request(&self, _kx: &KeyExchange) -> Result<String, DiagError> {
        self.record(FakeStep::BuildRequest);
        match self.faults.get(&FakeStep::BuildRequest) {
            Some(Fault::Error(err)) => Err(err.to_error()),
            _ => Ok(FAKE_REQUEST_BODY.to_string()),
        }
    }

    async fn fetch_association(
        &self,
        _kx: &KeyExchange,
        _endpoint: &str,
        _body: &str,
    ) -> Result<Association, DiagError> {
        self.record(FakeStep::Fetch);
        self.apply_fault(FakeStep::Fetch).await?;
        Ok(Association::from_expires_in(
            self.association.lifetime_secs,
            self.association.handle.clone(),
            self.association.secret(),
            self.association.assoc_type.clone(),
        ))
    }
}

pub struct FakeNegotiatorBuilder {
    server_url: String,
    refusal: Option<String>,
    faults: HashMap<FakeStep, Fault>,
    association: Association,
}

impl FakeNegotiatorBuilder {
    pub fn new() -> Self {
        Self {
            server_url: "http://unittest.example/server".to_string(),
            refusal: None,
            faults: HashMap::new(),
            association: Association::from_expires_in(3600, "assoc handle", "s3krit", "HMAC-SHA1"),
        }
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Discovery answers but refuses the handshake
    pub fn refuse_handshake(mut self, reason: impl Into<String>) -> Self {
        self.refusal = Some(reason.into());
        self
    }

    pub fn protocol_error(mut self, step: FakeStep, msg: impl Into<String>) -> Self {
        self.faults
            .insert(step, Fault::Error(FaultError::Protocol(msg.into())));
        self
    }

    pub fn transport_error(mut self, step: FakeStep, msg: impl Into<String>) -> Self {
        self.faults
            .insert(step, Fault::Error(FaultError::Transport(msg.into())));
        self
    }

    /// Stall an async step; ignored for `BuildRequest`
    pub fn delay(mut self, step: FakeStep, delay: Duration) -> Self {
        self.faults.insert(step, Fault::Delay(delay));
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        self.association = association;
        self
    }

    pub fn build(self) -> FakeNegotiator {
        FakeNegotiator {
            server_url: self.server_url,
            refusal: self.refusal,
            faults: self.faults,
            association: self.association,
            call_counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for FakeNegotiatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
