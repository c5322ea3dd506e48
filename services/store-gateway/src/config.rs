use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tsdb_guard_admission::LimitsConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreGatewayConfig {
    pub server_host: String,
    pub server_port: u16,
    pub runtime_config_file: Option<PathBuf>,
    pub runtime_reload_interval_secs: u64,
    /// JSON file with the blocks to serve, keyed by tenant.
    pub blocks_file: Option<PathBuf>,
    /// Emit a diagnostic for every non-trivial reservation.
    pub log_limiter_decisions: bool,
    pub request_timeout_secs: u64,
    pub default_limits: LimitsConfig,
    pub log_level: String,
}

impl Default for StoreGatewayConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 9096,
            runtime_config_file: None,
            runtime_reload_interval_secs: 10,
            blocks_file: None,
            log_limiter_decisions: false,
            request_timeout_secs: 60,
            default_limits: LimitsConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl StoreGatewayConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("STORE_GATEWAY_HOST") {
            if !host.trim().is_empty() {
                config.server_host = host;
            }
        }
        if let Ok(port) = env::var("STORE_GATEWAY_PORT") {
            config.server_port = port
                .parse::<u16>()
                .context("failed to parse STORE_GATEWAY_PORT as u16")?;
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
        if let Ok(path) = env::var("BLOCKS_FILE") {
            if !path.trim().is_empty() {
                config.blocks_file = Some(PathBuf::from(path));
            }
        }
        if let Ok(flag) = env::var("LOG_LIMITER_DECISIONS") {
            config.log_limiter_decisions = parse_bool(&flag)
                .with_context(|| format!("invalid LOG_LIMITER_DECISIONS value: {flag}"))?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout
                .parse()
                .context("failed to parse REQUEST_TIMEOUT_SECS as u64")?;
        }
        if let Ok(limit) = env::var("MAX_CHUNKS_PER_QUERY") {
            config.default_limits.max_chunks_per_query = limit
                .parse()
                .context("failed to parse MAX_CHUNKS_PER_QUERY as u64")?;
        }
        if let Ok(limit) = env::var("MAX_SERIES_PER_QUERY") {
            config.default_limits.max_series_per_query = limit
                .parse()
                .context("failed to parse MAX_SERIES_PER_QUERY as u64")?;
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

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{other}'")),
    }
}
