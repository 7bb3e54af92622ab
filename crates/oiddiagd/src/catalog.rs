//! Built-in tests served by the harness.

use std::sync::Arc;

use crate::config::DiagnosticConfig;
use crate::diagnostician::Diagnostician;
use crate::router::RequestRouter;
use crate::test_case::{ActionTable, TestCase, TryHandshake, TRY_ACTION};

pub const ASSOCIATE_TEST: &str = "Associate";
pub const ASSOCIATE_TITLE: &str = "Associate with the identity server";

/// Router with every built-in test registered.
pub fn standard_router(diagnostician: Arc<Diagnostician>, config: &DiagnosticConfig) -> RequestRouter {
    let mut router = RequestRouter::new(Arc::clone(&diagnostician));

    let default_identifier = config.default_identifier.clone();
    let attempt_timeout = config.attempt_timeout();
    router.register(ASSOCIATE_TEST, move || {
        let try_action = TryHandshake::new(
            Arc::clone(&diagnostician),
            default_identifier.clone(),
            attempt_timeout,
        );
        TestCase::new(
            ASSOCIATE_TEST,
            ASSOCIATE_TITLE,
            ActionTable::new().with(TRY_ACTION, Arc::new(try_action)),
        )
    });

    router
}
