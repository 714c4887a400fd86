//! HTTP routes for triggering sync runs

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use sync::{CsvSource, InvocationEvent, Reconciler};
use sync_core::DirectoryApi;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::metrics::SyncMetrics;

/// Shared state behind every route
pub struct AppState<D> {
    reconciler: Reconciler<D>,
    /// Held for the whole of a run so two invocations never overlap
    run_lock: Mutex<()>,
    metrics: SyncMetrics,
}

impl<D: DirectoryApi> AppState<D> {
    pub fn new(reconciler: Reconciler<D>, metrics: SyncMetrics) -> Self {
        Self {
            reconciler,
            run_lock: Mutex::new(()),
            metrics,
        }
    }
}

pub fn router<D: DirectoryApi + 'static>(state: Arc<AppState<D>>) -> Router {
    Router::new()
        .route("/invoke", post(invoke::<D>))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler::<D>))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn invoke<D: DirectoryApi + 'static>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<InvocationEvent>, JsonRejection>,
) -> Response {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => {
            warn!("Rejected invocation: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let source = CsvSource::from(event);
    let _running = state.run_lock.lock().await;
    info!("Invoked sync from {}", source.describe());

    match state.reconciler.run(&source).await {
        Ok(summary) => {
            state.metrics.record_summary(&summary);
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(e) => {
            error!("Sync aborted: {}", e);
            state.metrics.record_aborted();
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler<D: DirectoryApi + 'static>(
    State(state): State<Arc<AppState<D>>>,
) -> Response {
    match state.metrics.encode() {
        Ok(output) => (StatusCode::OK, output).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
