pub mod api;
pub mod config;
pub mod ingester;
pub mod limiter;
pub mod validation;

pub use api::{create_router, ApiState};
pub use config::IngesterConfig;
pub use ingester::{IngestStats, Ingester, PushError, PushRequest, PushResponse, Sample, TimeSeries};
pub use limiter::{IngesterLimiter, SeriesLimitError};
pub use validation::{validate_series, ValidationError};
