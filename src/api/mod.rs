//! Plain-text exposition endpoint.
//!
//! Serves the aggregation table as one line per key on `/` and `/metrics`,
//! plus a `/healthz` liveness probe. Requests are read-only; they never
//! write to the table.

pub mod cache;
pub mod render;

pub use cache::ResponseCache;
pub use render::{render, render_plain, render_timestamped};

use crate::core::config::ExpositionConfig;
use crate::core::{ExpositionFormat, Result};
use crate::metrics::AggregationTable;
use axum::{
    extract::{RawQuery, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Content type of exposition responses
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    table: AggregationTable,
    cache: Arc<ResponseCache>,
    format: ExpositionFormat,
}

impl ApiState {
    pub fn new(table: AggregationTable, config: &ExpositionConfig) -> Self {
        Self {
            table,
            cache: Arc::new(ResponseCache::new(config.cache_ttl, config.refresh_key.clone())),
            format: config.format,
        }
    }
}

/// Build the exposition router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(exposition_handler))
        .route("/metrics", get(exposition_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Serving metrics on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Exposition server stopped");
    Ok(())
}

/// GET / and /metrics
async fn exposition_handler(
    State(state): State<ApiState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let refresh = state.cache.wants_refresh(query.as_deref());
    let body = state
        .cache
        .get_or_render(refresh, || render(&state.table.snapshot(), state.format));

    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

/// GET /healthz
async fn health_handler() -> &'static str {
    "ok"
}
