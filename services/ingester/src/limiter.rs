use std::sync::Arc;

use thiserror::Error;
use tsdb_guard_admission::{BoxError, ErrorFormatter, Sampler, TenantLimits};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeriesLimitError {
    #[error("per-user series limit exceeded")]
    MaxSeriesPerUser,
    #[error("per-metric series limit exceeded")]
    MaxSeriesPerMetric,
}

/// Enforces per-tenant series limits on this ingester. A tenant's global
/// limit is spread across the ingesters that hold its series.
pub struct IngesterLimiter {
    limits: Arc<dyn TenantLimits>,
    replication_factor: u64,
    ingester_count: u64,
    sampler: Option<Arc<Sampler>>,
}

impl IngesterLimiter {
    pub fn new(
        limits: Arc<dyn TenantLimits>,
        replication_factor: u64,
        ingester_count: u64,
        sampler: Option<Arc<Sampler>>,
    ) -> Self {
        Self {
            limits,
            replication_factor,
            ingester_count,
            sampler,
        }
    }

    pub fn sampler(&self) -> Option<&Arc<Sampler>> {
        self.sampler.as_ref()
    }

    pub fn assert_max_series_per_user(
        &self,
        tenant_id: &str,
        series: u64,
    ) -> Result<(), SeriesLimitError> {
        let limit = self.max_series_per_user(tenant_id);
        if limit == 0 || series < limit {
            return Ok(());
        }
        Err(SeriesLimitError::MaxSeriesPerUser)
    }

    pub fn assert_max_series_per_metric(
        &self,
        tenant_id: &str,
        series: u64,
    ) -> Result<(), SeriesLimitError> {
        let limit = self.max_series_per_metric(tenant_id);
        if limit == 0 || series < limit {
            return Ok(());
        }
        Err(SeriesLimitError::MaxSeriesPerMetric)
    }

    pub fn max_series_per_user(&self, tenant_id: &str) -> u64 {
        self.convert_global_to_local(self.limits.max_global_series_per_user(tenant_id))
    }

    pub fn max_series_per_metric(&self, tenant_id: &str) -> u64 {
        self.convert_global_to_local(self.limits.max_global_series_per_metric(tenant_id))
    }

    fn convert_global_to_local(&self, global_limit: u64) -> u64 {
        if global_limit == 0 || self.ingester_count == 0 {
            return global_limit;
        }
        global_limit
            .saturating_mul(self.replication_factor)
            .div_ceil(self.ingester_count)
    }
}

impl ErrorFormatter for IngesterLimiter {
    fn format_error(&self, tenant_id: &str, err: BoxError) -> BoxError {
        match err.downcast_ref::<SeriesLimitError>() {
            Some(SeriesLimitError::MaxSeriesPerUser) => {
                let global = self.limits.max_global_series_per_user(tenant_id);
                let local = self.max_series_per_user(tenant_id);
                format!(
                    "per-user series limit of {local} exceeded, please contact administrator to raise it (global limit: {global} actual local limit: {local})"
                )
                .into()
            }
            Some(SeriesLimitError::MaxSeriesPerMetric) => {
                let global = self.limits.max_global_series_per_metric(tenant_id);
                let local = self.max_series_per_metric(tenant_id);
                format!(
                    "per-metric series limit of {local} exceeded, please contact administrator to raise it (global limit: {global} actual local limit: {local})"
                )
                .into()
            }
            None => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdb_guard_admission::{LimitsConfig, Overrides};

    fn limiter(per_user: u64, per_metric: u64, rf: u64, ingesters: u64) -> IngesterLimiter {
        let overrides = Overrides::new(LimitsConfig {
            max_global_series_per_user: per_user,
            max_global_series_per_metric: per_metric,
            ..LimitsConfig::default()
        });
        IngesterLimiter::new(Arc::new(overrides), rf, ingesters, None)
    }

    #[test]
    fn global_limit_spread_over_ingesters() {
        let limiter = limiter(1000, 10, 3, 4);
        assert_eq!(limiter.max_series_per_user("t"), 750);
        assert_eq!(limiter.max_series_per_metric("t"), 8);
    }

    #[test]
    fn zero_global_limit_stays_disabled() {
        let limiter = limiter(0, 0, 3, 4);
        assert!(limiter.assert_max_series_per_user("t", u64::MAX - 1).is_ok());
        assert!(limiter.assert_max_series_per_metric("t", 1_000_000).is_ok());
    }

    #[test]
    fn asserts_against_local_limit() {
        let limiter = limiter(4, 2, 1, 1);
        assert!(limiter.assert_max_series_per_user("t", 3).is_ok());
        assert_eq!(
            limiter.assert_max_series_per_user("t", 4),
            Err(SeriesLimitError::MaxSeriesPerUser)
        );
        assert_eq!(
            limiter.assert_max_series_per_metric("t", 2),
            Err(SeriesLimitError::MaxSeriesPerMetric)
        );
    }

    #[test]
    fn formats_series_limit_errors() {
        let limiter = limiter(1000, 10, 3, 4);
        let formatted =
            limiter.format_error("t", Box::new(SeriesLimitError::MaxSeriesPerUser));
        assert_eq!(
            formatted.to_string(),
            "per-user series limit of 750 exceeded, please contact administrator to raise it (global limit: 1000 actual local limit: 750)"
        );

        let passthrough = limiter.format_error("t", "something else".into());
        assert_eq!(passthrough.to_string(), "something else");
    }
}
