pub mod collector;
pub mod config;
pub mod events;
pub mod fetcher;
pub mod github;
pub mod metrics;
pub mod paginator;
pub mod queue;
pub mod repository;
pub mod store;
pub mod types;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use queue::{EventQueue, QueuedEvent};
use repository::Repository;
use serde::Serialize;
use std::sync::Arc;
use store::Store;
use tower_http::trace::TraceLayer;

const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Producer side of the webhook event queue.
    pub queue: EventQueue,
}

impl AppState {
    pub fn new(queue: EventQueue) -> Self {
        Self { queue }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/webhooks/github", post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "octostats",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Queues a GitHub webhook delivery for the event consumer.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let delivery_id = headers
        .get(DELIVERY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let event = QueuedEvent {
        delivery_id,
        payload: body.to_vec(),
    };

    match state.queue.push(event) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            tracing::error!("Webhook event consumer is gone, rejecting delivery");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Runs one collection pass and sends the resulting batch.
///
/// Nothing is sent when collection fails.
pub async fn run_once(repo: &Arc<dyn Repository>, store: &dyn Store) -> anyhow::Result<()> {
    let batch = collector::retrieve(Arc::clone(repo)).await?;
    store.send(&batch).await?;
    tracing::info!(repo = %repo.identity(), items = batch.len(), "Metrics sent");
    Ok(())
}
