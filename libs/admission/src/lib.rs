pub mod error;
pub mod extract;
pub mod labels;
pub mod limiter;
pub mod limits;
pub mod metrics;
pub mod middleware;
pub mod sampler;
pub mod tenant;

pub use error::{
    http_response_from_error, make_limit_error, make_metric_limit_error, status, too_busy,
    wrap_with_user, BoxError, ClassifiedError, ErrorFormatter, HttpGrpcError, HttpResponse,
    UserError, TOO_BUSY_ERROR, TOO_BUSY_MESSAGE,
};
pub use extract::JsonBody;
pub use labels::{Label, LabelSet, METRIC_NAME_LABEL};
pub use limiter::{
    Decision, Limiter, LimiterFactory, ReservationLimiter, ReservationObserver,
    ReservationRecord, ReservationStatus, ResourceKind, TracingObserver,
};
pub use limits::{
    load_overrides, spawn_reload_task, LimitsConfig, Overrides, OverridesError, RuntimeConfig,
    TenantLimits,
};
pub use metrics::{AtomicCounter, Counter, FailureCounters};
pub use sampler::{SampledError, Sampler};
pub use tenant::{tenant_from_headers, validate_tenant_id, TenantError, TENANT_HEADER};
