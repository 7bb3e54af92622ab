//! HTTP server for oiddiagd

use crate::diagnostician::Diagnostician;
use crate::router::RequestRouter;
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub diagnostician: Arc<Diagnostician>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(router: RequestRouter) -> Self {
        let diagnostician = Arc::clone(router.diagnostician());
        Self {
            router: Arc::new(router),
            diagnostician,
            start_time: Instant::now(),
        }
    }
}

/// Full application: JSON API plus the request-glue fallback
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::diagnose_routes())
        .merge(routes::test_routes())
        .fallback(routes::dispatch_glue)
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("  Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down gracefully");
    }
}
