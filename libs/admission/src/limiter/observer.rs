use std::fmt::{self, Write};

use serde::Serialize;
use tracing::warn;

use super::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Ok,
    Failed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Ok => "OK",
            ReservationStatus::Failed => "FAILED",
        }
    }
}

/// Diagnostic produced by a reservation: what was added, the running total
/// after the add, and the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRecord {
    pub resource: Option<ResourceKind>,
    pub delta: u64,
    pub reserved: u64,
    pub limit: u64,
    pub status: ReservationStatus,
}

/// Consumes reservation diagnostics. Implementations must not fail or block
/// for long; they run inline with `reserve`.
pub trait ReservationObserver: Send + Sync {
    fn observe(&self, record: &ReservationRecord);

    fn log(&self, fields: &[(&str, &dyn fmt::Display)]) {
        let _ = fields;
    }
}

/// Forwards diagnostics to `tracing` at warn level.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    component: &'static str,
}

impl TracingObserver {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("limiter")
    }
}

impl ReservationObserver for TracingObserver {
    fn observe(&self, record: &ReservationRecord) {
        let resource = record.resource.map(|kind| kind.as_str()).unwrap_or("unknown");
        warn!(
            source = self.component,
            func = "reserve",
            resource,
            delta = record.delta,
            reserved = record.reserved,
            limit = record.limit,
            status = record.status.as_str(),
            "adding {} elements to the limiter",
            record.delta
        );
    }

    fn log(&self, fields: &[(&str, &dyn fmt::Display)]) {
        let mut rendered = String::new();
        for (idx, (key, value)) in fields.iter().enumerate() {
            if idx > 0 {
                rendered.push(' ');
            }
            let _ = write!(rendered, "{key}={value}");
        }
        warn!(source = self.component, fields = %rendered, "limiter diagnostic");
    }
}
