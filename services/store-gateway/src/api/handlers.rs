use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use tracing::instrument;
use tsdb_guard_admission::{tenant_from_headers, HttpResponse, JsonBody};

use crate::query::SeriesQuery;

use super::types::{HealthResponse, LimitFailuresResponse, SeriesResponse};
use super::ApiState;

type ApiResult<T> = Result<Json<T>, HttpResponse>;

#[instrument(skip_all, fields(matchers = query.matchers.len()))]
pub async fn query_series(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    JsonBody(query): JsonBody<SeriesQuery>,
) -> ApiResult<SeriesResponse> {
    let tenant_id = tenant_from_headers(&headers)?;

    state
        .store
        .series(&tenant_id, query)
        .await
        .map(|series| Json(SeriesResponse { series }))
        .map_err(|err| err.to_http_response())
}

pub async fn get_limit_failures(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<LimitFailuresResponse> {
    Ok(Json(LimitFailuresResponse {
        failures: state.store.failure_counters().snapshot(),
    }))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "store-gateway".to_string(),
    })
}
