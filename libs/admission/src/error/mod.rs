//! Rejection taxonomy shared by the ingestion and query paths.
//!
//! Every rejection ends up as a status code plus message text, which is all the
//! httpgrpc transport carries across the RPC boundary.

mod attribution;
mod classified;
mod httpgrpc;

pub use attribution::{wrap_with_user, UserError};
pub use classified::{
    make_limit_error, make_metric_limit_error, BoxError, ClassifiedError, ErrorFormatter,
};
pub use httpgrpc::{
    http_response_from_error, status, status_code_of, too_busy, HttpGrpcError, HttpResponse,
    TOO_BUSY_ERROR, TOO_BUSY_MESSAGE,
};
