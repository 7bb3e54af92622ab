//! HTTP surface tests, driven through the axum router without a socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use oiddiag_shared::rpc::{ErrorResponse, HealthResponse, ListTestsResponse, RunReport};
use oiddiag_shared::KeyExchange;
use oiddiagd::catalog;
use oiddiagd::config::DiagnosticConfig;
use oiddiagd::diagnostician::Diagnostician;
use oiddiagd::negotiator::{FakeNegotiator, FakeNegotiatorBuilder};
use oiddiagd::server::{app, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app(fake: FakeNegotiator) -> axum::Router {
    let diag = Arc::new(Diagnostician::new(Arc::new(fake), KeyExchange::plaintext()));
    let router = catalog::standard_router(diag, &DiagnosticConfig::default());
    app(AppState::new(router))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(test_app(FakeNegotiator::new()), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.tests_registered, 1);
}

#[tokio::test]
async fn test_diagnose_returns_report() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/diagnose")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"identifier":"unittest.example/joe"}"#))
        .unwrap();
    let (status, body) = send(test_app(FakeNegotiator::new()), request).await;
    assert_eq!(status, StatusCode::OK);

    let report: RunReport = serde_json::from_slice(&body).unwrap();
    assert!(report.succeeded);
    assert_eq!(report.identifier, "unittest.example/joe");
    assert_eq!(report.events.len(), 3);
    assert!(!String::from_utf8_lossy(&body).contains("s3krit"));
}

#[tokio::test]
async fn test_diagnose_failure_is_still_a_report() {
    let fake = FakeNegotiatorBuilder::new()
        .refuse_handshake("no openid.server link")
        .build();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/diagnose")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"identifier":"unittest.example/joe"}"#))
        .unwrap();
    let (status, body) = send(test_app(fake), request).await;
    assert_eq!(status, StatusCode::OK);

    let report: RunReport = serde_json::from_slice(&body).unwrap();
    assert!(!report.succeeded);
    assert_eq!(report.events.len(), 1);
}

#[tokio::test]
async fn test_diagnose_empty_identifier_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/diagnose")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"identifier":"  "}"#))
        .unwrap();
    let (status, body) = send(test_app(FakeNegotiator::new()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert!(error.message.contains("identifier"));
}

#[tokio::test]
async fn test_list_tests() {
    let (status, body) = send(test_app(FakeNegotiator::new()), get("/v1/tests")).await;
    assert_eq!(status, StatusCode::OK);

    let list: ListTestsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.tests.len(), 1);
    assert_eq!(list.tests[0].name, "Associate");
    assert_eq!(list.tests[0].locator, "Associate/?action=try");
    assert_eq!(list.tests[0].summary.total, 0);
}

#[tokio::test]
async fn test_unknown_test_is_404() {
    let (status, _) = send(test_app(FakeNegotiator::new()), get("/v1/tests/Nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(test_app(FakeNegotiator::new()), get("/Nope/?action=try")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8_lossy(&body).contains("Nope"));
}

#[tokio::test]
async fn test_glue_try_then_list_shows_attempt() {
    let app = test_app(FakeNegotiator::new());

    let (status, body) = send(
        app.clone(),
        get("/Associate/?action=try&openid_url=unittest.example%2Fjoe"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("unittest.example/joe"));
    assert!(text.contains("1 succeeded, 0 failed, 0 incomplete"));

    let (_, body) = send(app, get("/v1/tests/Associate")).await;
    let info: oiddiag_shared::rpc::TestInfo = serde_json::from_slice(&body).unwrap();
    assert_eq!(info.summary.successes, 1);
    assert_eq!(info.attempts.len(), 1);
    assert_eq!(info.attempts[0].ordinal, 1);
}

#[tokio::test]
async fn test_glue_missing_identifier_is_bad_request() {
    let (status, _) = send(test_app(FakeNegotiator::new()), get("/Associate/?action=try")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_glue_root_lists_tests() {
    let (status, body) = send(test_app(FakeNegotiator::new()), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("Associate"));
}
