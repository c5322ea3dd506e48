use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ClassifiedError;
use crate::metrics::Counter;

use super::{Limiter, ReservationObserver, ReservationRecord, ReservationStatus, ResourceKind};

/// Outcome of a single reservation, before any side effects run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub admitted: bool,
    pub record: Option<ReservationRecord>,
}

/// Checks whether the total reserved for one operation has passed a limit.
///
/// Reservations are never released: once the total crosses the limit every
/// later call fails, including `reserve(0)`. A limit of 0 disables the check.
pub struct ReservationLimiter {
    resource: Option<ResourceKind>,
    limit: u64,
    reserved: AtomicU64,
    failed_counter: Arc<dyn Counter>,
    failed_once: AtomicBool,
    observer: Option<Arc<dyn ReservationObserver>>,
}

impl ReservationLimiter {
    pub fn new(
        limit: u64,
        failed_counter: Arc<dyn Counter>,
        observer: Option<Arc<dyn ReservationObserver>>,
    ) -> Self {
        Self {
            resource: None,
            limit,
            reserved: AtomicU64::new(0),
            failed_counter,
            failed_once: AtomicBool::new(false),
            observer,
        }
    }

    pub fn with_resource(mut self, resource: ResourceKind) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn resource(&self) -> Option<ResourceKind> {
        self.resource
    }

    /// Adds `num` to the running total and compares it to the limit. Does not
    /// touch the failure counter or the observer.
    pub fn decide(&self, num: u64) -> Decision {
        if self.limit == 0 {
            return Decision {
                admitted: true,
                record: None,
            };
        }

        // fetch_update never returns Err when the closure always yields Some.
        let previous = match self.reserved.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
            Some(cur.saturating_add(num))
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        let reserved = previous.saturating_add(num);

        if reserved > self.limit {
            return Decision {
                admitted: false,
                record: Some(self.record(num, reserved, ReservationStatus::Failed)),
            };
        }

        Decision {
            admitted: true,
            record: (num != 0).then(|| self.record(num, reserved, ReservationStatus::Ok)),
        }
    }

    fn record(&self, delta: u64, reserved: u64, status: ReservationStatus) -> ReservationRecord {
        ReservationRecord {
            resource: self.resource,
            delta,
            reserved,
            limit: self.limit,
            status,
        }
    }

    fn record_failure(&self) {
        if self
            .failed_once
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.failed_counter.inc();
        }
    }
}

impl Limiter for ReservationLimiter {
    fn reserve(&self, num: u64) -> Result<(), ClassifiedError> {
        let decision = self.decide(num);

        if !decision.admitted {
            self.record_failure();
        }

        if let (Some(observer), Some(record)) = (&self.observer, &decision.record) {
            observer.observe(record);
        }

        if decision.admitted {
            Ok(())
        } else {
            Err(ClassifiedError::limit_exceeded(self.limit))
        }
    }

    fn log(&self, fields: &[(&str, &dyn fmt::Display)]) {
        if let Some(observer) = &self.observer {
            observer.log(fields);
        }
    }
}

impl fmt::Debug for ReservationLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservationLimiter")
            .field("resource", &self.resource)
            .field("limit", &self.limit)
            .field("reserved", &self.reserved())
            .field("failed", &self.failed_once.load(Ordering::Acquire))
            .finish()
    }
}
