use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tsdb_guard_admission::middleware::{instrument_httpgrpc_handle, set_request_id};

use crate::config::IngesterConfig;
use crate::ingester::Ingester;

mod handlers;
mod types;

pub use handlers::{get_stats, health_check, push};
pub use types::{HealthResponse, StatsResponse};

pub struct ApiState {
    pub ingester: Arc<Ingester>,
    pub config: Arc<IngesterConfig>,
}

impl ApiState {
    pub fn new(ingester: Arc<Ingester>, config: IngesterConfig) -> Self {
        Self {
            ingester,
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/api/v1/push", post(push))
        .route("/api/v1/stats", get(get_stats))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(middleware::from_fn(instrument_httpgrpc_handle))
        .layer(middleware::from_fn(set_request_id))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(tower_http::timeout::TimeoutLayer::new(timeout)),
        )
}
