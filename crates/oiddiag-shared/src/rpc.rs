//! JSON types of the daemon's HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_log::EventLog;
use crate::ledger::{Attempt, LedgerSummary, Outcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tests_registered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnoseRequest {
    pub identifier: String,
}

/// Serialized form of one diagnostic run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub identifier: String,
    pub state: String,
    pub succeeded: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub events: EventLog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInfo {
    pub name: String,
    pub title: String,
    pub locator: String,
    pub summary: LedgerSummary,
    #[serde(default)]
    pub attempts: Vec<AttemptView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTestsResponse {
    pub tests: Vec<TestInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptView {
    pub ordinal: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
}

impl From<&Attempt> for AttemptView {
    fn from(attempt: &Attempt) -> Self {
        Self {
            ordinal: attempt.ordinal(),
            created_at: attempt.created_at(),
            resolved_at: attempt.resolved_at(),
            outcome: attempt.outcome(),
        }
    }
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}
