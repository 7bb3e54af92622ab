//! Diagnostician: drives one handshake step by step and records a timeline.
//!
//! A run is strictly sequential: begin, associate-request, associate-fetch.
//! Each step's outcome is appended to the run's event log before the next
//! step starts. The first failing step ends the run in `Failed`; errors never
//! escape `run()`, callers read them from the log.

use chrono::{DateTime, Utc};
use oiddiag_shared::event_log::FailureKind;
use oiddiag_shared::render::render_timeline;
use oiddiag_shared::rpc::RunReport;
use oiddiag_shared::{
    DiagError, DiagRequest, DiagnosticEvent, EventLog, EventPayload, HandshakeOutcome, KeyExchange, Step,
    IDENTIFIER_FIELD,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DiagnosticConfig;
use crate::negotiator::Negotiator;

/// Bound on a single negotiator call when none is configured
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// States of one diagnostic run.
///
/// Every run starts at `Start` and ends at `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    BeganHandshake,
    AssociationRequested,
    AssociationFetched,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        match (self, next) {
            (Self::Start, Self::BeganHandshake)
            | (Self::BeganHandshake, Self::AssociationRequested)
            | (Self::AssociationRequested, Self::AssociationFetched)
            | (Self::AssociationFetched, Self::Done) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::BeganHandshake => write!(f, "began_handshake"),
            Self::AssociationRequested => write!(f, "association_requested"),
            Self::AssociationFetched => write!(f, "association_fetched"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Finished diagnostic run
#[derive(Debug, Clone)]
pub struct DiagnosticRun {
    id: Uuid,
    identifier: String,
    state: RunState,
    log: EventLog,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl DiagnosticRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }

    /// Kind and cause of the failure that ended the run, if it failed.
    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        if self.succeeded() {
            return None;
        }
        match self.log.last().map(|event| &event.payload) {
            Some(EventPayload::Failure { kind, cause }) => Some((*kind, cause.as_str())),
            _ => None,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn to_report(&self) -> RunReport {
        RunReport {
            run_id: self.id.to_string(),
            identifier: self.identifier.clone(),
            state: self.state.to_string(),
            succeeded: self.succeeded(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            events: self.log.clone(),
        }
    }
}

/// Mutable side of a run while it is in flight
struct RunRecorder {
    id: Uuid,
    identifier: String,
    state: RunState,
    log: EventLog,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl RunRecorder {
    fn start(identifier: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            state: RunState::Start,
            log: EventLog::new(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {} -> {}",
            self.state,
            next
        );
        debug!("Run {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn record(&mut self, event: DiagnosticEvent, next: RunState) {
        self.log.push(event);
        self.advance(next);
    }

    fn fail(&mut self, event: DiagnosticEvent) {
        warn!("Run {} failed at {}: {}", self.id, event.step, event.label);
        self.record(event, RunState::Failed);
    }

    fn fail_step(&mut self, step: Step, err: &DiagError) {
        let event = DiagnosticEvent::step_failed(step, self.elapsed_ms(), err);
        self.fail(event);
    }

    fn finish(self) -> DiagnosticRun {
        info!(
            "Run {} for {} finished in state {} with {} events",
            self.id,
            self.identifier,
            self.state,
            self.log.len()
        );
        DiagnosticRun {
            id: self.id,
            identifier: self.identifier,
            state: self.state,
            log: self.log,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Orchestrator for handshake runs
pub struct Diagnostician {
    negotiator: Arc<dyn Negotiator>,
    key_exchange: KeyExchange,
    step_timeout: Duration,
}

impl Diagnostician {
    pub fn new(negotiator: Arc<dyn Negotiator>, key_exchange: KeyExchange) -> Self {
        Self {
            negotiator,
            key_exchange,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn from_config(negotiator: Arc<dyn Negotiator>, config: &DiagnosticConfig) -> Self {
        Self::new(negotiator, config.key_exchange()).with_step_timeout(config.step_timeout())
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn key_exchange(&self) -> &KeyExchange {
        &self.key_exchange
    }

    /// Run the full handshake against `identifier`.
    pub async fn run(&self, identifier: &str) -> DiagnosticRun {
        let mut run = RunRecorder::start(identifier);
        info!("Run {} started for {}", run.id, identifier);

        let begun = self
            .bounded(Step::Begin, self.negotiator.begin_handshake(identifier))
            .await;
        let context = match begun {
            Ok(HandshakeOutcome::Success(context)) => {
                let event = DiagnosticEvent::handshake_started(run.elapsed_ms(), &context);
                run.record(event, RunState::BeganHandshake);
                context
            }
            Ok(HandshakeOutcome::Failure { reason }) => {
                let event = DiagnosticEvent::handshake_refused(run.elapsed_ms(), reason);
                run.fail(event);
                return run.finish();
            }
            Err(err) => {
                run.fail_step(Step::Begin, &err);
                return run.finish();
            }
        };

        let body = match self.negotiator.build_association_request(&self.key_exchange) {
            Ok(body) => {
                let event = DiagnosticEvent::association_requested(run.elapsed_ms(), body.clone());
                run.record(event, RunState::AssociationRequested);
                body
            }
            Err(err) => {
                run.fail_step(Step::AssociateRequest, &err);
                return run.finish();
            }
        };

        let fetched = self
            .bounded(
                Step::AssociateFetch,
                self.negotiator
                    .fetch_association(&self.key_exchange, &context.server_url, &body),
            )
            .await;
        match fetched {
            Ok(association) => {
                let event = DiagnosticEvent::association_fetched(run.elapsed_ms(), &association);
                run.record(event, RunState::AssociationFetched);
                run.advance(RunState::Done);
            }
            Err(err) => run.fail_step(Step::AssociateFetch, &err),
        }
        run.finish()
    }

    /// Run against the request's identifier field and write the timeline.
    pub async fn diagnose_request(
        &self,
        req: &mut (dyn DiagRequest + Send),
    ) -> Result<DiagnosticRun, DiagError> {
        let identifier = req
            .field(IDENTIFIER_FIELD)
            .map(str::to_owned)
            .ok_or_else(|| DiagError::MissingField(IDENTIFIER_FIELD.to_string()))?;
        let run = self.run(&identifier).await;
        req.write(render_timeline(&identifier, run.events()).as_bytes());
        Ok(run)
    }

    async fn bounded<T, F>(&self, step: Step, fut: F) -> Result<T, DiagError>
    where
        F: Future<Output = Result<T, DiagError>>,
    {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DiagError::Timeout {
                step: step.to_string(),
                after_ms: self.step_timeout.as_millis() as u64,
            }),
        }
    }
}
