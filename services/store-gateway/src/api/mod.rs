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

use crate::bucket::BucketStore;
use crate::config::StoreGatewayConfig;

mod handlers;
mod types;

pub use handlers::{get_limit_failures, health_check, query_series};
pub use types::{HealthResponse, LimitFailuresResponse, SeriesResponse};

pub struct ApiState {
    pub store: Arc<BucketStore>,
    pub config: Arc<StoreGatewayConfig>,
}

impl ApiState {
    pub fn new(store: Arc<BucketStore>, config: StoreGatewayConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/api/v1/series", post(query_series))
        .route("/api/v1/limits/failures", get(get_limit_failures))
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
