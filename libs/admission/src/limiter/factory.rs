use std::fmt;
use std::sync::Arc;

use crate::limits::TenantLimits;
use crate::metrics::Counter;

use super::{ReservationLimiter, ReservationObserver, ResourceKind};

pub type LimitResolver = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Builds a fresh limiter per operation. The limit is resolved every time a
/// limiter is built, so configuration changes apply to the next operation.
#[derive(Clone)]
pub struct LimiterFactory {
    resource: ResourceKind,
    resolver: LimitResolver,
    observer: Option<Arc<dyn ReservationObserver>>,
}

impl LimiterFactory {
    pub fn new(
        resource: ResourceKind,
        resolver: impl Fn() -> u64 + Send + Sync + 'static,
        observer: Option<Arc<dyn ReservationObserver>>,
    ) -> Self {
        Self {
            resource,
            resolver: Arc::new(resolver),
            observer,
        }
    }

    pub fn chunks(
        resolver: impl Fn() -> u64 + Send + Sync + 'static,
        observer: Option<Arc<dyn ReservationObserver>>,
    ) -> Self {
        Self::new(ResourceKind::Chunks, resolver, observer)
    }

    pub fn series(
        resolver: impl Fn() -> u64 + Send + Sync + 'static,
        observer: Option<Arc<dyn ReservationObserver>>,
    ) -> Self {
        Self::new(ResourceKind::Series, resolver, observer)
    }

    /// Factory reading the per-query limit for `tenant_id` from `limits`.
    pub fn for_tenant(
        limits: Arc<dyn TenantLimits>,
        tenant_id: impl Into<String>,
        resource: ResourceKind,
        observer: Option<Arc<dyn ReservationObserver>>,
    ) -> Self {
        let tenant_id = tenant_id.into();
        Self::new(
            resource,
            move || match resource {
                ResourceKind::Chunks => limits.max_chunks_per_query(&tenant_id),
                ResourceKind::Series => limits.max_series_per_query(&tenant_id),
            },
            observer,
        )
    }

    pub fn resource(&self) -> ResourceKind {
        self.resource
    }

    pub fn new_limiter(&self, failed_counter: Arc<dyn Counter>) -> ReservationLimiter {
        ReservationLimiter::new((self.resolver)(), failed_counter, self.observer.clone())
            .with_resource(self.resource)
    }
}

impl fmt::Debug for LimiterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterFactory")
            .field("resource", &self.resource)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
