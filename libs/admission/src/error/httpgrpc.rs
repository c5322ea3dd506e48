use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::{ClassifiedError, UserError};

/// Wire status codes. The numeric values are part of the RPC contract.
pub mod status {
    pub const VALIDATION: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const LIMIT_EXCEEDED: u16 = 422;
    pub const INTERNAL: u16 = 500;
    pub const OVERLOADED: u16 = 503;
}

pub const TOO_BUSY_MESSAGE: &str =
    "the ingester is currently too busy to process queries, try again later";

/// System-wide overload refusal. Returned verbatim, never tenant-attributed.
pub static TOO_BUSY_ERROR: HttpGrpcError =
    HttpGrpcError::from_static(status::OVERLOADED, TOO_BUSY_MESSAGE);

pub fn too_busy() -> &'static HttpGrpcError {
    &TOO_BUSY_ERROR
}

/// An HTTP response tunnelled through the RPC layer as an error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGrpcError {
    code: u16,
    body: Cow<'static, str>,
}

impl HttpGrpcError {
    pub const fn from_static(code: u16, body: &'static str) -> Self {
        Self {
            code,
            body: Cow::Borrowed(body),
        }
    }

    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            body: Cow::Owned(body.into()),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for HttpGrpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

impl StdError for HttpGrpcError {}

/// The envelope the transport writes on the wire: a status and a text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            body: body.into(),
        }
    }

    /// Like [`http_response_from_error`], but unclassified errors become a 500.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        http_response_from_error(err)
            .unwrap_or_else(|| Self::new(status::INTERNAL, err.to_string()))
    }
}

impl From<&HttpGrpcError> for HttpResponse {
    fn from(err: &HttpGrpcError) -> Self {
        Self::new(err.code, err.body.as_ref())
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Status code carried anywhere along the error's source chain.
pub fn status_code_of(err: &(dyn StdError + 'static)) -> Option<u16> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(grpc) = err.downcast_ref::<HttpGrpcError>() {
            return Some(grpc.code());
        }
        if let Some(classified) = err.downcast_ref::<ClassifiedError>() {
            return Some(classified.code());
        }
        if let Some(user) = err.downcast_ref::<UserError>() {
            if let Some(code) = user.code() {
                return Some(code);
            }
        }
        current = err.source();
    }
    None
}

/// Builds the wire response for a classified error. The body is the outermost
/// message, so tenant prefixes and series identity survive the boundary.
pub fn http_response_from_error(err: &(dyn StdError + 'static)) -> Option<HttpResponse> {
    status_code_of(err).map(|code| HttpResponse::new(code, err.to_string()))
}
