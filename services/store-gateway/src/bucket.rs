use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};
use tsdb_guard_admission::{
    ClassifiedError, FailureCounters, LabelSet, Limiter, LimiterFactory, ReservationObserver,
    ResourceKind, TenantLimits,
};

use crate::blocks::{Block, BlockStore, Chunk};
use crate::query::{QueryError, SeriesEntry, SeriesQuery};

/// Serves series queries over a tenant's blocks. Every query gets its own
/// chunks and series limiters, shared by all block workers of that query.
pub struct BucketStore {
    blocks: Arc<BlockStore>,
    limits: Arc<dyn TenantLimits>,
    failure_counters: FailureCounters,
    observer: Option<Arc<dyn ReservationObserver>>,
}

impl BucketStore {
    pub fn new(
        blocks: Arc<BlockStore>,
        limits: Arc<dyn TenantLimits>,
        observer: Option<Arc<dyn ReservationObserver>>,
    ) -> Self {
        Self {
            blocks,
            limits,
            failure_counters: FailureCounters::new(),
            observer,
        }
    }

    pub fn failure_counters(&self) -> &FailureCounters {
        &self.failure_counters
    }

    pub fn limiter_factory(&self, tenant_id: &str, resource: ResourceKind) -> LimiterFactory {
        LimiterFactory::for_tenant(
            Arc::clone(&self.limits),
            tenant_id,
            resource,
            self.observer.clone(),
        )
    }

    fn new_limiter(&self, tenant_id: &str, resource: ResourceKind) -> Arc<dyn Limiter> {
        let limiter = self
            .limiter_factory(tenant_id, resource)
            .new_limiter(self.failure_counters.counter(resource));
        Arc::new(limiter)
    }

    pub async fn series(
        &self,
        tenant_id: &str,
        query: SeriesQuery,
    ) -> Result<Vec<SeriesEntry>, QueryError> {
        query.validate()?;

        let series_limiter = self.new_limiter(tenant_id, ResourceKind::Series);
        let chunks_limiter = self.new_limiter(tenant_id, ResourceKind::Chunks);
        let query = Arc::new(query);
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut workers = JoinSet::new();
        for block in self.blocks.blocks(tenant_id) {
            if !block.overlaps(query.min_time_ms, query.max_time_ms) {
                continue;
            }
            let query = Arc::clone(&query);
            let series_limiter = Arc::clone(&series_limiter);
            let chunks_limiter = Arc::clone(&chunks_limiter);
            let cancelled = Arc::clone(&cancelled);
            workers.spawn_blocking(move || {
                scan_block(
                    &block,
                    &query,
                    series_limiter.as_ref(),
                    chunks_limiter.as_ref(),
                    &cancelled,
                )
            });
        }

        let mut merged: BTreeMap<LabelSet, Vec<Chunk>> = BTreeMap::new();
        let mut failure: Option<QueryError> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(found)) => {
                    for entry in found {
                        merged.entry(entry.labels).or_default().extend(entry.chunks);
                    }
                }
                Ok(Err(err)) => {
                    cancelled.store(true, Ordering::Release);
                    failure.get_or_insert(QueryError::Limit(err));
                }
                Err(err) => {
                    cancelled.store(true, Ordering::Release);
                    failure.get_or_insert(QueryError::Worker(err.to_string()));
                }
            }
        }

        if let Some(err) = failure {
            warn!(tenant_id, error = %err, "series query aborted");
            return Err(err);
        }

        debug!(tenant_id, series = merged.len(), "series query completed");
        Ok(merged
            .into_iter()
            .map(|(labels, mut chunks)| {
                chunks.sort();
                chunks.dedup();
                SeriesEntry { labels, chunks }
            })
            .collect())
    }
}

impl fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketStore")
            .field("tenants", &self.blocks.tenant_count())
            .field("failure_counters", &self.failure_counters)
            .finish()
    }
}

/// Collects matching series of one block, reserving one series and the
/// number of overlapping chunks for each. Stops at the first rejection or
/// once another worker has failed.
fn scan_block(
    block: &Block,
    query: &SeriesQuery,
    series_limiter: &dyn Limiter,
    chunks_limiter: &dyn Limiter,
    cancelled: &AtomicBool,
) -> Result<Vec<SeriesEntry>, ClassifiedError> {
    let block_id: &dyn fmt::Display = &block.id;
    let mut found = Vec::new();

    for series in &block.series {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        if !query.matches(&series.labels) {
            continue;
        }

        let chunks: Vec<Chunk> = series
            .chunks
            .iter()
            .filter(|chunk| chunk.overlaps(query.min_time_ms, query.max_time_ms))
            .copied()
            .collect();
        if chunks.is_empty() {
            continue;
        }

        if let Err(err) = series_limiter.reserve(1) {
            series_limiter.log(&[("block", block_id)]);
            return Err(err);
        }
        if let Err(err) = chunks_limiter.reserve(chunks.len() as u64) {
            chunks_limiter.log(&[("block", block_id)]);
            return Err(err);
        }

        found.push(SeriesEntry {
            labels: series.labels.clone(),
            chunks,
        });
    }

    Ok(found)
}
