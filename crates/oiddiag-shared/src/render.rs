//! Plain-text rendering of timelines and attempt histories.
//!
//! No secrets, no colour codes: output goes straight into response bodies.
//! The CLI does its own coloured rendering from the JSON API.

use crate::event_log::{DiagnosticEvent, EventLog, EventPayload};
use crate::ledger::{AttemptLedger, Outcome};
use crate::rpc::TestInfo;
use std::fmt::Write;

/// One line per event, numbered by position in the log.
pub fn render_timeline(identifier: &str, log: &EventLog) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Diagnostic timeline for {}", identifier);
    if log.is_empty() {
        let _ = writeln!(out, "  (no events)");
        return out;
    }
    for (index, event) in log.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. [{:>6}ms] {:<17} {:<6} {}",
            index + 1,
            event.elapsed_ms,
            event.step.to_string(),
            event.status.to_string(),
            event.label
        );
        if let Some(detail) = payload_detail(event) {
            let _ = writeln!(out, "                {}", detail);
        }
    }
    out
}

fn payload_detail(event: &DiagnosticEvent) -> Option<String> {
    match &event.payload {
        EventPayload::Handshake {
            identity_url,
            delegate,
            ..
        } => Some(match delegate {
            Some(d) => format!("identity {} (delegate {})", identity_url, d),
            None => format!("identity {}", identity_url),
        }),
        EventPayload::AssociationRequest { body } => Some(format!("request body: {}", body)),
        EventPayload::Association {
            assoc_type,
            expires_at,
            secret_fingerprint,
            ..
        } => Some(format!(
            "{} expires {} secret sha256:{}",
            assoc_type,
            expires_at.to_rfc3339(),
            secret_fingerprint
        )),
        EventPayload::Failure { cause, .. } => Some(format!("cause: {}", cause)),
        EventPayload::Unknown => None,
    }
}

/// Attempt history of one test, followed by its counts and retry locator.
pub fn render_history(title: &str, ledger: &AttemptLedger) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", title, ledger.name());
    let attempts = ledger.attempts();
    if attempts.is_empty() {
        let _ = writeln!(out, "  no attempts yet");
    }
    for attempt in &attempts {
        let outcome = attempt.outcome();
        let marker = match outcome {
            Outcome::Success => "+",
            Outcome::Failure { .. } => "-",
            Outcome::Pending => "?",
        };
        let _ = writeln!(
            out,
            "  {} #{} {} {}",
            marker,
            attempt.ordinal(),
            attempt.created_at().format("%Y-%m-%d %H:%M:%S"),
            outcome
        );
    }
    let summary = ledger.summary();
    let _ = writeln!(
        out,
        "  {} succeeded, {} failed, {} incomplete",
        summary.successes, summary.failures, summary.incompletes
    );
    let _ = writeln!(out, "  try again: {}", ledger.get_locator());
    out
}

/// Default listing view of every registered test.
pub fn render_listing(tests: &[TestInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Available tests");
    if tests.is_empty() {
        let _ = writeln!(out, "  (none registered)");
    }
    for test in tests {
        let _ = writeln!(
            out,
            "  {:<20} {:<40} {}/{}/{} -> {}",
            test.name,
            test.title,
            test.summary.successes,
            test.summary.failures,
            test.summary.incompletes,
            test.locator
        );
    }
    out
}
