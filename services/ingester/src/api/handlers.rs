use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use tracing::instrument;
use tsdb_guard_admission::{tenant_from_headers, HttpResponse, JsonBody};

use crate::ingester::{PushRequest, PushResponse};

use super::types::{HealthResponse, StatsResponse};
use super::ApiState;

type ApiResult<T> = Result<Json<T>, HttpResponse>;

#[instrument(skip_all, fields(series = request.timeseries.len()))]
pub async fn push(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<PushRequest>,
) -> ApiResult<PushResponse> {
    let tenant_id = tenant_from_headers(&headers)?;

    state
        .ingester
        .push(&tenant_id, request)
        .map(Json)
        .map_err(|err| err.to_http_response())
}

pub async fn get_stats(State(state): State<Arc<ApiState>>) -> ApiResult<StatsResponse> {
    Ok(Json(StatsResponse {
        stats: state.ingester.stats(),
    }))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "ingester".to_string(),
    })
}
