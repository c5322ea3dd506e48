//! Request extractors that keep body rejections inside the rejection taxonomy.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use tracing::debug;

use crate::error::{status, HttpResponse};

/// JSON body whose every rejection (syntax, shape, content type) surfaces as
/// a 400, leaving 422 to limit errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = HttpResponse;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(status = %rejection.status(), "rejecting request body");
                Err(HttpResponse::new(status::VALIDATION, rejection.body_text()))
            }
        }
    }
}
