//! Named diagnostic tests and their action tables.

use async_trait::async_trait;
use oiddiag_shared::render::render_history;
use oiddiag_shared::rpc::{AttemptView, TestInfo};
use oiddiag_shared::event_log::FailureKind;
use oiddiag_shared::{
    AttemptLedger, DiagError, DiagRequest, FailureCause, Severity, ACTION_FIELD, IDENTIFIER_FIELD,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::diagnostician::Diagnostician;

/// Default action: render the attempt history
pub const SHOW_ACTION: &str = "show";

/// Retry action advertised by ledger locators
pub const TRY_ACTION: &str = oiddiag_shared::ledger::TRY_ACTION;

/// Handler for one named action of a test
#[async_trait]
pub trait Action: Send + Sync {
    async fn invoke(&self, test: &TestCase, req: &mut (dyn DiagRequest + Send)) -> Result<(), DiagError>;
}

#[derive(Clone, Default)]
pub struct ActionTable {
    handlers: HashMap<String, Arc<dyn Action>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn Action>) {
        self.handlers.insert(name.into(), action);
    }

    pub fn with(mut self, name: impl Into<String>, action: Arc<dyn Action>) -> Self {
        self.register(name, action);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.handlers.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

pub struct TestCase {
    title: String,
    ledger: AttemptLedger,
    actions: ActionTable,
}

impl TestCase {
    pub fn new(name: impl Into<String>, title: impl Into<String>, actions: ActionTable) -> Self {
        Self {
            title: title.into(),
            ledger: AttemptLedger::new(name),
            actions,
        }
    }

    pub fn name(&self) -> &str {
        self.ledger.name()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn info(&self) -> TestInfo {
        TestInfo {
            name: self.name().to_string(),
            title: self.title.clone(),
            locator: self.ledger.get_locator(),
            summary: self.ledger.summary(),
            attempts: self
                .ledger
                .attempts()
                .iter()
                .map(|a| AttemptView::from(a.as_ref()))
                .collect(),
        }
    }

    /// Dispatch on the request's `action` field.
    ///
    /// Unknown actions are logged at WARNING and answered with the history;
    /// errors raised by a handler propagate to the caller.
    pub async fn handle_request(&self, req: &mut (dyn DiagRequest + Send)) -> Result<(), DiagError> {
        let action = req.field(ACTION_FIELD).map(str::to_owned);
        let handler = action.as_deref().and_then(|name| self.actions.get(name)).cloned();

        match handler {
            Some(handler) => {
                info!("{}: running action {:?}", self.name(), action);
                handler.invoke(self, req).await
            }
            None => {
                if let Some(name) = action.as_deref().filter(|name| *name != SHOW_ACTION) {
                    let message = format!("{}: no handler for action {:?}", self.name(), name);
                    warn!("{}", message);
                    req.log(Severity::Warning, &message);
                }
                self.show_history(req);
                Ok(())
            }
        }
    }

    pub fn show_history(&self, req: &mut (dyn DiagRequest + Send)) {
        req.write(render_history(&self.title, &self.ledger).as_bytes());
    }
}

/// `try` action: one fresh full handshake run recorded as one attempt
pub struct TryHandshake {
    diagnostician: Arc<Diagnostician>,
    default_identifier: Option<String>,
    attempt_timeout: Duration,
}

impl TryHandshake {
    pub fn new(
        diagnostician: Arc<Diagnostician>,
        default_identifier: Option<String>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            diagnostician,
            default_identifier,
            attempt_timeout,
        }
    }
}

#[async_trait]
impl Action for TryHandshake {
    async fn invoke(&self, test: &TestCase, req: &mut (dyn DiagRequest + Send)) -> Result<(), DiagError> {
        let identifier = req
            .field(IDENTIFIER_FIELD)
            .map(str::to_owned)
            .or_else(|| self.default_identifier.clone())
            .ok_or_else(|| DiagError::MissingField(IDENTIFIER_FIELD.to_string()))?;

        // Pending from here on, so an interrupted run stays visible
        let attempt = test.ledger().new_attempt();
        info!("{}: attempt #{} against {}", test.name(), attempt.ordinal(), identifier);

        match tokio::time::timeout(self.attempt_timeout, self.diagnostician.run(&identifier)).await {
            Ok(run) => {
                match run.failure() {
                    Some((kind, cause)) if kind != FailureKind::HandshakeFailure => {
                        attempt.fail_with(FailureCause::Error {
                            message: cause.to_string(),
                        })?;
                    }
                    _ => attempt.set_result(run.succeeded())?,
                }
                req.write(
                    oiddiag_shared::render::render_timeline(&identifier, run.events()).as_bytes(),
                );
            }
            Err(_) => {
                warn!(
                    "{}: attempt #{} timed out after {:?}",
                    test.name(),
                    attempt.ordinal(),
                    self.attempt_timeout
                );
                attempt.time_out(self.attempt_timeout)?;
                req.write(
                    format!(
                        "Attempt #{} timed out after {}s\n",
                        attempt.ordinal(),
                        self.attempt_timeout.as_secs()
                    )
                    .as_bytes(),
                );
            }
        }
        req.write(b"\n");
        test.show_history(req);
        Ok(())
    }
}
