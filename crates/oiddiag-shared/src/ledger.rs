//! Attempt ledger: the per-test history of tries.
//!
//! Every try of a named test becomes an [`Attempt`] the instant it starts,
//! so a probe that never finishes stays visible as incomplete instead of
//! vanishing. Classification is a read-side query over that history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use crate::error::DiagError;

/// Action token used in ledger locators.
pub const TRY_ACTION: &str = "try";

/// Why a resolved attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// The probe ran to completion and reported failure
    Reported,
    /// The probe was still running when its time budget ran out
    TimedOut { after_ms: u64 },
    /// The probe could not run to completion
    Error { message: String },
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reported => write!(f, "failed"),
            Self::TimedOut { after_ms } => write!(f, "timed out after {}ms", after_ms),
            Self::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Classification of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Success,
    Failure { cause: FailureCause },
}

impl Outcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "incomplete"),
            Self::Success => write!(f, "success"),
            Self::Failure { cause } => write!(f, "{}", cause),
        }
    }
}

#[derive(Debug, Clone)]
struct Resolution {
    outcome: Outcome,
    resolved_at: DateTime<Utc>,
}

/// One recorded try of a named test.
///
/// The ordinal never changes after creation; the outcome moves from pending
/// to resolved exactly once.
#[derive(Debug)]
pub struct Attempt {
    ordinal: u64,
    created_at: DateTime<Utc>,
    resolution: OnceLock<Resolution>,
}

impl Attempt {
    fn new(ordinal: u64) -> Self {
        Self {
            ordinal,
            created_at: Utc::now(),
            resolution: OnceLock::new(),
        }
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolution.get().map(|r| r.resolved_at)
    }

    pub fn outcome(&self) -> Outcome {
        self.resolution
            .get()
            .map(|r| r.outcome.clone())
            .unwrap_or(Outcome::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.get().is_some()
    }

    /// Resolve with a plain pass/fail verdict.
    ///
    /// A second resolution is rejected with [`DiagError::InvalidState`] and
    /// leaves the first outcome in place.
    pub fn set_result(&self, success: bool) -> Result<(), DiagError> {
        let outcome = if success {
            Outcome::Success
        } else {
            Outcome::Failure {
                cause: FailureCause::Reported,
            }
        };
        self.resolve(outcome)
    }

    /// Resolve as failed with an explicit cause.
    pub fn fail_with(&self, cause: FailureCause) -> Result<(), DiagError> {
        self.resolve(Outcome::Failure { cause })
    }

    /// Resolve as failed because the probe outlived its budget.
    pub fn time_out(&self, after: Duration) -> Result<(), DiagError> {
        self.fail_with(FailureCause::TimedOut {
            after_ms: after.as_millis() as u64,
        })
    }

    fn resolve(&self, outcome: Outcome) -> Result<(), DiagError> {
        self.resolution
            .set(Resolution {
                outcome,
                resolved_at: Utc::now(),
            })
            .map_err(|_| DiagError::InvalidState {
                ordinal: self.ordinal,
            })
    }
}

/// Counts over a ledger's history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub incompletes: usize,
}

/// Ordered, append-only history of attempts for one named test
#[derive(Debug)]
pub struct AttemptLedger {
    name: String,
    attempts: Mutex<Vec<Arc<Attempt>>>,
}

impl AttemptLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a pending attempt with the next ordinal.
    pub fn new_attempt(&self) -> Arc<Attempt> {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = Arc::new(Attempt::new(attempts.len() as u64 + 1));
        attempts.push(Arc::clone(&attempt));
        attempt
    }

    /// Full history in creation order.
    pub fn attempts(&self) -> Vec<Arc<Attempt>> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_successes(&self) -> Vec<Arc<Attempt>> {
        self.filter(Outcome::is_success)
    }

    pub fn get_failures(&self) -> Vec<Arc<Attempt>> {
        self.filter(Outcome::is_failure)
    }

    pub fn get_incompletes(&self) -> Vec<Arc<Attempt>> {
        self.filter(Outcome::is_pending)
    }

    /// Counts taken from a single snapshot, so they always add up.
    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for attempt in self.attempts() {
            summary.total += 1;
            match attempt.outcome() {
                Outcome::Pending => summary.incompletes += 1,
                Outcome::Success => summary.successes += 1,
                Outcome::Failure { .. } => summary.failures += 1,
            }
        }
        summary
    }

    /// Relative locator that re-triggers this test: `<name>/?action=try`.
    pub fn get_locator(&self) -> String {
        format!("{}/?action={}", self.name, TRY_ACTION)
    }

    fn filter(&self, keep: fn(&Outcome) -> bool) -> Vec<Arc<Attempt>> {
        self.attempts()
            .into_iter()
            .filter(|a| keep(&a.outcome()))
            .collect()
    }
}
