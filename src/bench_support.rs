use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::runtime::Runtime;
use tsdb_guard_admission::{
    AtomicCounter, LabelSet, LimitsConfig, Overrides, ReservationLimiter, TenantLimits,
};
use tsdb_guard_ingester::{Ingester, PushRequest, Sample, TimeSeries};
use tsdb_guard_store_gateway::{Block, BlockStore, BucketStore, Chunk, StoredSeries};

pub const BENCH_TENANT: &str = "tenant-bench";

/// Limiter with a fresh failure counter, for contention benches.
pub fn limiter(limit: u64) -> (Arc<ReservationLimiter>, Arc<AtomicCounter>) {
    let counter = Arc::new(AtomicCounter::new());
    let limiter = ReservationLimiter::new(limit, counter.clone(), None);
    (Arc::new(limiter), counter)
}

pub struct QueryBenchFixture {
    pub store: Arc<BucketStore>,
    pub runtime: Runtime,
    pub tenant_id: String,
}

impl QueryBenchFixture {
    /// Builds `blocks` blocks of `series_per_block` series each, spread over
    /// ten jobs, with random chunk counts. The seed keeps runs comparable.
    pub fn new(blocks: usize, series_per_block: usize, limits: LimitsConfig) -> anyhow::Result<Self> {
        let mut rng = StdRng::seed_from_u64(42);
        let store = BlockStore::new();

        for block_idx in 0..blocks {
            let series = (0..series_per_block)
                .map(|series_idx| {
                    let job = format!("job-{}", series_idx % 10);
                    let instance = format!("instance-{block_idx}-{series_idx}");
                    let chunks = (0..rng.gen_range(1..=8i64))
                        .map(|i| Chunk {
                            min_time_ms: i * 7_200_000,
                            max_time_ms: (i + 1) * 7_200_000 - 1,
                            num_samples: rng.gen_range(60..=240),
                        })
                        .collect();
                    StoredSeries {
                        labels: LabelSet::from_pairs([
                            ("__name__", "http_requests_total"),
                            ("instance", instance.as_str()),
                            ("job", job.as_str()),
                        ]),
                        chunks,
                    }
                })
                .collect();
            store.add_block(BENCH_TENANT, Block::new(format!("block-{block_idx}"), series));
        }

        let limits: Arc<dyn TenantLimits> = Arc::new(Overrides::new(limits));
        let runtime = Runtime::new()?;
        Ok(Self {
            store: Arc::new(BucketStore::new(Arc::new(store), limits, None)),
            runtime,
            tenant_id: BENCH_TENANT.to_string(),
        })
    }
}

pub struct PushBenchFixture {
    pub ingester: Arc<Ingester>,
    pub tenant_id: String,
}

impl PushBenchFixture {
    pub fn new(limits: LimitsConfig) -> Self {
        let limits: Arc<dyn TenantLimits> = Arc::new(Overrides::new(limits));
        Self {
            ingester: Arc::new(Ingester::new(limits, 1, 1, 0, None)),
            tenant_id: BENCH_TENANT.to_string(),
        }
    }
}

/// Push request with `series` distinct series of one sample each.
pub fn push_request(series: usize, offset: usize) -> PushRequest {
    PushRequest {
        timeseries: (offset..offset + series)
            .map(|idx| {
                let instance = format!("instance-{idx}");
                TimeSeries {
                    labels: LabelSet::from_pairs([
                        ("__name__", "up"),
                        ("instance", instance.as_str()),
                        ("job", "bench"),
                    ]),
                    samples: vec![Sample {
                        timestamp_ms: idx as i64,
                        value: 1.0,
                    }],
                }
            })
            .collect(),
    }
}
