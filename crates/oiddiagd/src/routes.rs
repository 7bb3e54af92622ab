//! API routes for oiddiagd
//!
//! JSON endpoints live under /v1. Every other path is request glue: it is
//! turned into a `BufferedRequest` and dispatched through the test router,
//! which is where ledger locators such as `Associate/?action=try` resolve.

use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use oiddiag_shared::rpc::{
    DiagnoseRequest, ErrorResponse, HealthResponse, ListTestsResponse, RunReport, TestInfo,
};
use oiddiag_shared::{BufferedRequest, DiagError, Severity, VERSION};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(err: &DiagError) -> StatusCode {
    match err {
        DiagError::NotFound(_) => StatusCode::NOT_FOUND,
        DiagError::MissingField(_) => StatusCode::BAD_REQUEST,
        DiagError::InvalidState { .. } => StatusCode::CONFLICT,
        DiagError::HandshakeFailure(_) | DiagError::Protocol(_) | DiagError::Transport(_) => {
            StatusCode::BAD_GATEWAY
        }
        DiagError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: DiagError) -> ApiError {
    (
        status_for(&err),
        Json(ErrorResponse {
            code: err.code(),
            message: err.to_string(),
        }),
    )
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tests_registered: state.router.count(),
    })
}

// ============================================================================
// Diagnose Routes
// ============================================================================

pub fn diagnose_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/diagnose", post(diagnose))
}

async fn diagnose(
    State(state): State<AppStateArc>,
    Json(req): Json<DiagnoseRequest>,
) -> Result<Json<RunReport>, ApiError> {
    if req.identifier.trim().is_empty() {
        return Err(api_error(DiagError::MissingField("identifier".to_string())));
    }
    info!("  Diagnosing {}", req.identifier);
    let run = state.diagnostician.run(&req.identifier).await;
    Ok(Json(run.to_report()))
}

// ============================================================================
// Test Routes
// ============================================================================

pub fn test_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/tests", get(list_tests))
        .route("/v1/tests/:name", get(get_test))
}

async fn list_tests(State(state): State<AppStateArc>) -> Result<Json<ListTestsResponse>, ApiError> {
    let tests = state.router.list().map_err(api_error)?;
    Ok(Json(ListTestsResponse { tests }))
}

async fn get_test(
    State(state): State<AppStateArc>,
    Path(name): Path<String>,
) -> Result<Json<TestInfo>, ApiError> {
    let test = state.router.get(&name).map_err(|e| {
        error!("  Test not found: {}", name);
        api_error(e)
    })?;
    Ok(Json(test.info()))
}

// ============================================================================
// Request glue
// ============================================================================

/// Fallback: dispatch any other path through the test router as plain text.
pub async fn dispatch_glue(
    State(state): State<AppStateArc>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut req = BufferedRequest::new(uri.path().trim_start_matches('/'));
    for (key, value) in params {
        req.add_field(key, value);
    }

    let result = state.router.dispatch(&mut req).await;

    for (severity, message) in req.log_messages() {
        match severity {
            Severity::Info => info!("  {}", message),
            Severity::Warning => warn!("  {}", message),
            Severity::Error => error!("  {}", message),
        }
    }

    let status = match &result {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!("  Dispatch of {} failed: {}", uri.path(), err);
            status_for(err)
        }
    };
    let mut body = req.into_output();
    if let Err(err) = result {
        body.extend_from_slice(format!("{}\n", err).as_bytes());
    }

    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
