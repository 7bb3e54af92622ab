//! Attempt ledger classification tests.

use oiddiag_shared::ledger::{AttemptLedger, FailureCause, Outcome};
use oiddiag_shared::DiagError;
use std::sync::Arc;
use std::thread;

/// `Some(true)` = success, `Some(false)` = failure, `None` = left pending
fn ledger_from(name: &str, results: &[Option<bool>]) -> AttemptLedger {
    let ledger = AttemptLedger::new(name);
    for result in results {
        let attempt = ledger.new_attempt();
        if let Some(success) = result {
            attempt.set_result(*success).unwrap();
        }
    }
    ledger
}

fn result_row() -> AttemptLedger {
    ledger_from(
        "ResultRow",
        &[
            Some(true),
            None,
            Some(false),
            Some(true),
            None,
            Some(false),
            None,
            Some(false),
            None,
        ],
    )
}

#[test]
fn test_get_failures() {
    assert_eq!(result_row().get_failures().len(), 3);
}

#[test]
fn test_get_successes() {
    assert_eq!(result_row().get_successes().len(), 2);
}

#[test]
fn test_get_incompletes() {
    assert_eq!(result_row().get_incompletes().len(), 4);
}

#[test]
fn test_get_locator() {
    assert_eq!(result_row().get_locator(), "ResultRow/?action=try");
}

#[test]
fn test_classification_keeps_creation_order() {
    let ledger = result_row();
    let failures: Vec<u64> = ledger.get_failures().iter().map(|a| a.ordinal()).collect();
    let incompletes: Vec<u64> = ledger.get_incompletes().iter().map(|a| a.ordinal()).collect();
    assert_eq!(failures, vec![3, 6, 8]);
    assert_eq!(incompletes, vec![2, 5, 7, 9]);
}

#[test]
fn test_queries_are_idempotent() {
    let ledger = result_row();
    let ordinals = |v: Vec<Arc<oiddiag_shared::Attempt>>| -> Vec<u64> {
        v.iter().map(|a| a.ordinal()).collect()
    };
    assert_eq!(ordinals(ledger.get_failures()), ordinals(ledger.get_failures()));
    assert_eq!(ordinals(ledger.get_successes()), ordinals(ledger.get_successes()));
    assert_eq!(ordinals(ledger.get_incompletes()), ordinals(ledger.get_incompletes()));
    assert_eq!(ledger.summary(), ledger.summary());
}

/// Every sequence of up to six attempts: classification counts add up.
#[test]
fn test_counts_always_sum_to_total() {
    let choices = [Some(true), Some(false), None];
    for len in 0..=6u32 {
        for mut code in 0..3usize.pow(len) {
            let mut results = Vec::new();
            for _ in 0..len {
                results.push(choices[code % 3]);
                code /= 3;
            }
            let ledger = ledger_from("Sum", &results);
            let sum = ledger.get_successes().len()
                + ledger.get_failures().len()
                + ledger.get_incompletes().len();
            assert_eq!(sum, len as usize, "results {:?}", results);

            let summary = ledger.summary();
            assert_eq!(summary.total, len as usize);
            assert_eq!(
                summary.successes + summary.failures + summary.incompletes,
                summary.total
            );
        }
    }
}

#[test]
fn test_set_result_twice_keeps_first_outcome() {
    let ledger = AttemptLedger::new("Twice");
    let attempt = ledger.new_attempt();
    attempt.set_result(false).unwrap();

    let err = attempt.set_result(true).unwrap_err();
    assert!(matches!(err, DiagError::InvalidState { ordinal: 1 }));
    assert_eq!(
        attempt.outcome(),
        Outcome::Failure {
            cause: FailureCause::Reported
        }
    );
    assert_eq!(ledger.get_successes().len(), 0);
}

#[test]
fn test_pending_attempt_visible_before_resolution() {
    let ledger = AttemptLedger::new("InFlight");
    let attempt = ledger.new_attempt();
    assert_eq!(ledger.get_incompletes().len(), 1);

    attempt.set_result(true).unwrap();
    assert_eq!(ledger.get_incompletes().len(), 0);
    assert_eq!(ledger.get_successes().len(), 1);
}

#[test]
fn test_concurrent_resolution_only_one_wins() {
    let ledger = AttemptLedger::new("Race");
    let attempt = ledger.new_attempt();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let attempt = Arc::clone(&attempt);
            thread::spawn(move || attempt.set_result(i % 2 == 0).is_ok())
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(wins, 1);
    assert!(attempt.is_resolved());
}

#[test]
fn test_concurrent_appends_get_unique_ordinals() {
    let ledger = Arc::new(AttemptLedger::new("Appends"));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..25 {
                    ledger.new_attempt().set_result(true).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut ordinals: Vec<u64> = ledger.attempts().iter().map(|a| a.ordinal()).collect();
    assert_eq!(ordinals.len(), 100);
    ordinals.dedup();
    assert_eq!(ordinals, (1..=100).collect::<Vec<u64>>());
}
