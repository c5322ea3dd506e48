use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::limiter::ResourceKind;

/// A monotonic counter handle. Increments are fire-and-forget.
pub trait Counter: Send + Sync {
    fn inc(&self);
}

#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Counter for AtomicCounter {
    fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }
}

/// One shared "queries dropped" counter per resource kind.
#[derive(Debug, Default, Clone)]
pub struct FailureCounters {
    counters: Arc<DashMap<ResourceKind, Arc<AtomicCounter>>>,
}

impl FailureCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, resource: ResourceKind) -> Arc<AtomicCounter> {
        self.counters.entry(resource).or_default().value().clone()
    }

    pub fn get(&self, resource: ResourceKind) -> u64 {
        self.counters
            .get(&resource)
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), entry.value().get()))
            .collect()
    }
}
