use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifiedError;

mod factory;
mod observer;
mod reservation;

pub use factory::{LimitResolver, LimiterFactory};
pub use observer::{ReservationObserver, ReservationRecord, ReservationStatus, TracingObserver};
pub use reservation::{Decision, ReservationLimiter};

/// The bounded resource a limiter instance guards for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Chunks,
    Series,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Chunks => "chunks",
            ResourceKind::Series => "series",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Limiter: Send + Sync {
    /// Reserves `num` units out of the total enforced by the limiter. Fails
    /// once the running total exceeds the limit, and keeps failing afterwards.
    fn reserve(&self, num: u64) -> Result<(), ClassifiedError>;

    /// Attaches extra diagnostic context. Never affects admission.
    fn log(&self, fields: &[(&str, &dyn fmt::Display)]);
}
