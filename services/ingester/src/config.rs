use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tsdb_guard_admission::LimitsConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngesterConfig {
    pub server_host: String,
    pub server_port: u16,
    /// JSON file with default and per-tenant limits, re-read periodically.
    pub runtime_config_file: Option<PathBuf>,
    pub runtime_reload_interval_secs: u64,
    pub replication_factor: u64,
    /// Number of ingesters sharing a tenant's global series limit.
    pub ingester_count: u64,
    /// 0 disables the in-flight push limit.
    pub max_inflight_push_requests: u64,
    /// Log one in N rejections. 0 or 1 logs all of them.
    pub error_sample_rate: u64,
    pub request_timeout_secs: u64,
    pub default_limits: LimitsConfig,
    pub log_level: String,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 9095,
            runtime_config_file: None,
            runtime_reload_interval_secs: 10,
            replication_factor: 3,
            ingester_count: 3,
            max_inflight_push_requests: 30_000,
            error_sample_rate: 10,
            request_timeout_secs: 30,
            default_limits: LimitsConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl IngesterConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("INGESTER_HOST") {
            if !host.trim().is_empty() {
                config.server_host = host;
            }
        }
        if let Ok(port) = env::var("INGESTER_PORT") {
            config.server_port = port
                .parse::<u16>()
                .context("failed to parse INGESTER_PORT as u16")?;
        }
        if let Ok(path) = env::var("RUNTIME_CONFIG_FILE") {
            if !path.trim().is_empty() {
                config.runtime_config_file = Some(PathBuf::from(path));
            }
        }
        if let Ok(interval) = env::var("RUNTIME_RELOAD_INTERVAL_SECS") {
            config.runtime_reload_interval_secs = interval
                .parse()
                .context("failed to parse RUNTIME_RELOAD_INTERVAL_SECS as u64")?;
        }
        if let Ok(factor) = env::var("REPLICATION_FACTOR") {
            config.replication_factor = factor
                .parse()
                .context("failed to parse REPLICATION_FACTOR as u64")?;
        }
        if let Ok(count) = env::var("INGESTER_COUNT") {
            config.ingester_count = count
                .parse()
                .context("failed to parse INGESTER_COUNT as u64")?;
        }
        if let Ok(max) = env::var("MAX_INFLIGHT_PUSH_REQUESTS") {
            config.max_inflight_push_requests = max
                .parse()
                .context("failed to parse MAX_INFLIGHT_PUSH_REQUESTS as u64")?;
        }
        if let Ok(rate) = env::var("ERROR_SAMPLE_RATE") {
            config.error_sample_rate = rate
                .parse()
                .context("failed to parse ERROR_SAMPLE_RATE as u64")?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout
                .parse()
                .context("failed to parse REQUEST_TIMEOUT_SECS as u64")?;
        }
        if let Ok(limit) = env::var("MAX_GLOBAL_SERIES_PER_USER") {
            config.default_limits.max_global_series_per_user = limit
                .parse()
                .context("failed to parse MAX_GLOBAL_SERIES_PER_USER as u64")?;
        }
        if let Ok(limit) = env::var("MAX_GLOBAL_SERIES_PER_METRIC") {
            config.default_limits.max_global_series_per_metric = limit
                .parse()
                .context("failed to parse MAX_GLOBAL_SERIES_PER_METRIC as u64")?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                config.log_level = level;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replication_factor == 0 {
            return Err(anyhow!("REPLICATION_FACTOR must be greater than zero"));
        }
        if self.ingester_count == 0 {
            return Err(anyhow!("INGESTER_COUNT must be greater than zero"));
        }
        if self.runtime_config_file.is_some() && self.runtime_reload_interval_secs == 0 {
            return Err(anyhow!(
                "RUNTIME_RELOAD_INTERVAL_SECS must be greater than zero when RUNTIME_CONFIG_FILE is set"
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("REQUEST_TIMEOUT_SECS must be greater than zero"));
        }
        Ok(())
    }
}
