use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use tsdb_guard_admission::{
    make_limit_error, make_metric_limit_error, too_busy, wrap_with_user, ClassifiedError,
    HttpGrpcError, HttpResponse, LabelSet, SampledError, Sampler, TenantLimits, UserError,
};

use crate::limiter::IngesterLimiter;
use crate::validation::validate_series;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushRequest {
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: LabelSet,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub created_series: usize,
    pub ingested_samples: usize,
}

#[derive(Debug, Error)]
pub enum PushError {
    /// The ingester as a whole is overloaded. Not attributed to the tenant.
    #[error("{0}")]
    Overloaded(&'static HttpGrpcError),
    #[error("{0}")]
    Rejected(UserError),
}

impl PushError {
    pub fn to_http_response(&self) -> HttpResponse {
        match self {
            PushError::Overloaded(err) => HttpResponse::from(*err),
            PushError::Rejected(err) => HttpResponse::from_error(err),
        }
    }
}

#[derive(Debug, Default)]
pub struct IngestStats {
    created_series: AtomicU64,
    ingested_samples: AtomicU64,
    rejected_validation: AtomicU64,
    rejected_series_limit: AtomicU64,
    rejected_overload: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatsSnapshot {
    pub created_series: u64,
    pub ingested_samples: u64,
    pub rejected_validation: u64,
    pub rejected_series_limit: u64,
    pub rejected_overload: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            created_series: self.created_series.load(Ordering::Relaxed),
            ingested_samples: self.ingested_samples.load(Ordering::Relaxed),
            rejected_validation: self.rejected_validation.load(Ordering::Relaxed),
            rejected_series_limit: self.rejected_series_limit.load(Ordering::Relaxed),
            rejected_overload: self.rejected_overload.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct TenantSeries {
    series: HashSet<LabelSet>,
    per_metric: HashMap<String, u64>,
    samples: u64,
}

pub(crate) struct InflightGuard<'a> {
    counter: &'a AtomicU64,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct Ingester {
    limits: Arc<dyn TenantLimits>,
    limiter: IngesterLimiter,
    tenants: DashMap<String, TenantSeries>,
    inflight: AtomicU64,
    max_inflight_push_requests: u64,
    stats: IngestStats,
}

impl Ingester {
    pub fn new(
        limits: Arc<dyn TenantLimits>,
        replication_factor: u64,
        ingester_count: u64,
        max_inflight_push_requests: u64,
        sampler: Option<Arc<Sampler>>,
    ) -> Self {
        let limiter = IngesterLimiter::new(
            Arc::clone(&limits),
            replication_factor,
            ingester_count,
            sampler,
        );
        Self {
            limits,
            limiter,
            tenants: DashMap::new(),
            inflight: AtomicU64::new(0),
            max_inflight_push_requests,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn series_count(&self, tenant_id: &str) -> usize {
        self.tenants
            .get(tenant_id)
            .map(|tenant| tenant.series.len())
            .unwrap_or(0)
    }

    pub fn sample_count(&self, tenant_id: &str) -> u64 {
        self.tenants
            .get(tenant_id)
            .map(|tenant| tenant.samples)
            .unwrap_or(0)
    }

    /// Appends a batch for `tenant_id`. The first rejected series aborts the
    /// rest of the batch; series before it stay ingested.
    pub fn push(&self, tenant_id: &str, request: PushRequest) -> Result<PushResponse, PushError> {
        let _inflight = self.start_push()?;

        let limits = self.limits.tenant_limits(tenant_id);
        let sampler = self.limiter.sampler();
        let mut tenant = self.tenants.entry(tenant_id.to_string()).or_default();
        let mut response = PushResponse::default();

        for series in request.timeseries {
            if let Err(err) = validate_series(&limits, &series.labels) {
                self.stats.rejected_validation.fetch_add(1, Ordering::Relaxed);
                let err = Sampler::wrap_error(
                    sampler,
                    ClassifiedError::validation_for_series(err, series.labels),
                );
                return Err(self.reject(tenant_id, err));
            }

            if !tenant.series.contains(&series.labels) {
                let current = tenant.series.len() as u64;
                if let Err(err) = self.limiter.assert_max_series_per_user(tenant_id, current) {
                    self.stats.rejected_series_limit.fetch_add(1, Ordering::Relaxed);
                    let err = make_limit_error(&self.limiter, sampler, tenant_id, err);
                    return Err(self.reject(tenant_id, err));
                }

                let metric = series.labels.metric_name().unwrap_or_default().to_string();
                let per_metric = tenant.per_metric.get(&metric).copied().unwrap_or(0);
                if let Err(err) = self.limiter.assert_max_series_per_metric(tenant_id, per_metric) {
                    self.stats.rejected_series_limit.fetch_add(1, Ordering::Relaxed);
                    let err =
                        make_metric_limit_error(&self.limiter, sampler, tenant_id, series.labels, err);
                    return Err(self.reject(tenant_id, err));
                }

                *tenant.per_metric.entry(metric).or_default() += 1;
                tenant.series.insert(series.labels);
                response.created_series += 1;
                self.stats.created_series.fetch_add(1, Ordering::Relaxed);
            }

            // Accepted series count even if a later one rejects the batch.
            let samples = series.samples.len();
            tenant.samples += samples as u64;
            response.ingested_samples += samples;
            self.stats
                .ingested_samples
                .fetch_add(samples as u64, Ordering::Relaxed);
        }

        debug!(
            tenant_id,
            created_series = response.created_series,
            ingested_samples = response.ingested_samples,
            "push accepted"
        );
        Ok(response)
    }

    pub(crate) fn start_push(&self) -> Result<InflightGuard<'_>, PushError> {
        let inflight = self.inflight.fetch_add(1, Ordering::AcqRel) + 1;
        let guard = InflightGuard {
            counter: &self.inflight,
        };

        if self.max_inflight_push_requests > 0 && inflight > self.max_inflight_push_requests {
            self.stats.rejected_overload.fetch_add(1, Ordering::Relaxed);
            warn!(
                inflight,
                limit = self.max_inflight_push_requests,
                "rejecting push, too many in-flight requests"
            );
            return Err(PushError::Overloaded(too_busy()));
        }

        Ok(guard)
    }

    fn reject(&self, tenant_id: &str, err: SampledError) -> PushError {
        err.log(tenant_id);
        PushError::Rejected(wrap_with_user(&err, tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdb_guard_admission::{LimitsConfig, Overrides, TOO_BUSY_ERROR};

    fn ingester(limits: LimitsConfig, max_inflight: u64) -> Ingester {
        Ingester::new(Arc::new(Overrides::new(limits)), 1, 1, max_inflight, None)
    }

    fn series(pairs: &[(&str, &str)], samples: usize) -> TimeSeries {
        TimeSeries {
            labels: LabelSet::from_pairs(pairs.iter().copied()),
            samples: (0..samples)
                .map(|idx| Sample {
                    timestamp_ms: idx as i64,
                    value: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn accepts_and_deduplicates_series() {
        let ingester = ingester(LimitsConfig::default(), 0);
        let request = PushRequest {
            timeseries: vec![
                series(&[("__name__", "up"), ("job", "a")], 2),
                series(&[("__name__", "up"), ("job", "a")], 1),
                series(&[("__name__", "up"), ("job", "b")], 1),
            ],
        };

        let response = ingester.push("t1", request).unwrap();
        assert_eq!(
            response,
            PushResponse {
                created_series: 2,
                ingested_samples: 4
            }
        );
        assert_eq!(ingester.series_count("t1"), 2);
        assert_eq!(ingester.sample_count("t1"), 4);
        assert_eq!(ingester.series_count("t2"), 0);
    }

    #[test]
    fn validation_failure_is_400_with_tenant_and_series() {
        let ingester = ingester(LimitsConfig::default(), 0);
        let request = PushRequest {
            timeseries: vec![series(&[("__name__", "up"), ("bad-label", "x")], 1)],
        };

        let err = ingester.push("t1", request).unwrap_err();
        let response = err.to_http_response();
        assert_eq!(response.code, 400);
        assert_eq!(
            response.body,
            "user=t1: sample invalid label: 'bad-label' This is for series {__name__=\"up\", bad-label=\"x\"}"
        );
        assert_eq!(ingester.stats().rejected_validation, 1);
    }

    #[test]
    fn rejected_batch_keeps_counts_of_accepted_series() {
        let ingester = ingester(LimitsConfig::default(), 0);
        let request = PushRequest {
            timeseries: vec![
                series(&[("__name__", "up")], 3),
                series(&[("__name__", "up"), ("bad-x", "1")], 2),
            ],
        };

        assert!(ingester.push("t1", request).is_err());

        let stats = ingester.stats();
        assert_eq!(ingester.series_count("t1"), 1);
        assert_eq!(stats.created_series, ingester.series_count("t1") as u64);
        assert_eq!(ingester.sample_count("t1"), 3);
        assert_eq!(stats.ingested_samples, 3);
        assert_eq!(stats.rejected_validation, 1);
    }

    #[test]
    fn per_user_limit_rejects_new_series_only() {
        let ingester = ingester(
            LimitsConfig {
                max_global_series_per_user: 1,
                ..LimitsConfig::default()
            },
            0,
        );
        let first = PushRequest {
            timeseries: vec![series(&[("__name__", "up")], 1)],
        };
        ingester.push("t1", first.clone()).unwrap();
        ingester.push("t1", first).unwrap();

        let second = PushRequest {
            timeseries: vec![series(&[("__name__", "down")], 1)],
        };
        let response = ingester.push("t1", second).unwrap_err().to_http_response();
        assert_eq!(response.code, 400);
        assert_eq!(
            response.body,
            "user=t1: per-user series limit of 1 exceeded, please contact administrator to raise it (global limit: 1 actual local limit: 1)"
        );
        assert_eq!(ingester.series_count("t1"), 1);
    }

    #[test]
    fn per_metric_limit_names_series() {
        let ingester = ingester(
            LimitsConfig {
                max_global_series_per_metric: 1,
                ..LimitsConfig::default()
            },
            0,
        );
        let request = PushRequest {
            timeseries: vec![
                series(&[("__name__", "up"), ("job", "a")], 1),
                series(&[("__name__", "up"), ("job", "b")], 1),
            ],
        };

        let response = ingester.push("t1", request).unwrap_err().to_http_response();
        assert_eq!(response.code, 400);
        assert!(response
            .body
            .starts_with("user=t1: per-metric series limit of 1 exceeded"));
        assert!(response
            .body
            .ends_with("This is for series {__name__=\"up\", job=\"b\"}"));
        assert_eq!(ingester.stats().rejected_series_limit, 1);
    }

    #[test]
    fn overload_returns_canonical_error() {
        let ingester = ingester(LimitsConfig::default(), 1);
        let held = ingester.start_push().unwrap();

        let err = ingester.push("t1", PushRequest::default()).unwrap_err();
        assert!(matches!(err, PushError::Overloaded(inner) if std::ptr::eq(inner, &TOO_BUSY_ERROR)));
        let response = err.to_http_response();
        assert_eq!(response.code, 503);
        assert_eq!(
            response.body,
            "the ingester is currently too busy to process queries, try again later"
        );
        assert_eq!(ingester.stats().rejected_overload, 1);

        drop(held);
        assert!(ingester.push("t1", PushRequest::default()).is_ok());
    }
}
