//! Per-tenant limits, resolved at the moment an operation starts.
//!
//! Defaults apply to every tenant; a runtime config file may override any
//! subset of fields for individual tenants and is re-read periodically.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Limit values for one tenant. `0` disables the corresponding limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_chunks_per_query: u64,
    pub max_series_per_query: u64,
    pub max_global_series_per_user: u64,
    pub max_global_series_per_metric: u64,
    pub max_label_names_per_series: usize,
    pub max_label_name_length: usize,
    pub max_label_value_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_query: 2_000_000,
            max_series_per_query: 0,
            max_global_series_per_user: 150_000,
            max_global_series_per_metric: 0,
            max_label_names_per_series: 30,
            max_label_name_length: 1024,
            max_label_value_length: 2048,
        }
    }
}

/// Source of the current limits for a tenant. Must tolerate concurrent reads.
pub trait TenantLimits: Send + Sync {
    fn tenant_limits(&self, tenant_id: &str) -> LimitsConfig;

    fn max_chunks_per_query(&self, tenant_id: &str) -> u64 {
        self.tenant_limits(tenant_id).max_chunks_per_query
    }

    fn max_series_per_query(&self, tenant_id: &str) -> u64 {
        self.tenant_limits(tenant_id).max_series_per_query
    }

    fn max_global_series_per_user(&self, tenant_id: &str) -> u64 {
        self.tenant_limits(tenant_id).max_global_series_per_user
    }

    fn max_global_series_per_metric(&self, tenant_id: &str) -> u64 {
        self.tenant_limits(tenant_id).max_global_series_per_metric
    }
}

#[derive(Debug, Error)]
pub enum OverridesError {
    #[error("failed to read runtime config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse runtime config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid default limits: {0}")]
    InvalidDefaults(#[source] serde_json::Error),
    #[error("invalid overrides for tenant {tenant_id}: {source}")]
    InvalidOverride {
        tenant_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Shape of the runtime config file. Both `defaults` and each tenant entry
/// may set any subset of fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub defaults: Option<Value>,
    pub overrides: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct LimitsSnapshot {
    defaults: LimitsConfig,
    tenants: HashMap<String, LimitsConfig>,
}

/// Defaults plus per-tenant overrides. The base limits given at construction
/// stay fixed; the runtime config file is layered over them on every reload.
/// Readers always see one consistent snapshot.
#[derive(Debug)]
pub struct Overrides {
    base: LimitsConfig,
    current: RwLock<Arc<LimitsSnapshot>>,
}

impl Default for Overrides {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

impl Overrides {
    pub fn new(base: LimitsConfig) -> Self {
        let snapshot = LimitsSnapshot {
            defaults: base.clone(),
            tenants: HashMap::new(),
        };
        Self {
            base,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn load_file(path: &Path) -> Result<Self, OverridesError> {
        Self::load_file_with_base(path, LimitsConfig::default())
    }

    pub fn load_file_with_base(path: &Path, base: LimitsConfig) -> Result<Self, OverridesError> {
        let overrides = Self::new(base);
        overrides.reload_from_file(path)?;
        Ok(overrides)
    }

    fn snapshot(&self) -> Arc<LimitsSnapshot> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn update(&self, change: impl FnOnce(&mut LimitsSnapshot)) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(Arc::make_mut(&mut current));
    }

    /// Limits configured at construction, before any runtime config.
    pub fn base(&self) -> &LimitsConfig {
        &self.base
    }

    pub fn defaults(&self) -> LimitsConfig {
        self.snapshot().defaults.clone()
    }

    pub fn set_tenant_limits(&self, tenant_id: &str, limits: LimitsConfig) {
        self.update(|snapshot| {
            snapshot.tenants.insert(tenant_id.to_string(), limits);
        });
    }

    pub fn remove_tenant(&self, tenant_id: &str) -> Option<LimitsConfig> {
        let mut removed = None;
        self.update(|snapshot| removed = snapshot.tenants.remove(tenant_id));
        removed
    }

    pub fn tenant_count(&self) -> usize {
        self.snapshot().tenants.len()
    }

    /// Re-reads the runtime config file. Returns the number of tenants with
    /// overrides. On error the previous configuration stays in place.
    pub fn reload_from_file(&self, path: &Path) -> Result<usize, OverridesError> {
        let raw = fs::read_to_string(path).map_err(|source| OverridesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RuntimeConfig = serde_json::from_str(&raw)?;
        self.apply(config)
    }

    /// Replaces defaults and tenant overrides in one step.
    pub fn apply(&self, config: RuntimeConfig) -> Result<usize, OverridesError> {
        let defaults = match config.defaults {
            Some(partial) => {
                merge_onto(&self.base, partial).map_err(OverridesError::InvalidDefaults)?
            }
            None => self.base.clone(),
        };

        let mut tenants = HashMap::with_capacity(config.overrides.len());
        for (tenant_id, partial) in config.overrides {
            let limits = merge_onto(&defaults, partial).map_err(|source| {
                OverridesError::InvalidOverride {
                    tenant_id: tenant_id.clone(),
                    source,
                }
            })?;
            tenants.insert(tenant_id, limits);
        }

        let count = tenants.len();
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Arc::new(LimitsSnapshot { defaults, tenants });

        Ok(count)
    }
}

impl TenantLimits for Overrides {
    fn tenant_limits(&self, tenant_id: &str) -> LimitsConfig {
        let snapshot = self.snapshot();
        snapshot
            .tenants
            .get(tenant_id)
            .unwrap_or(&snapshot.defaults)
            .clone()
    }
}

fn merge_onto(defaults: &LimitsConfig, partial: Value) -> Result<LimitsConfig, serde_json::Error> {
    let mut merged = serde_json::to_value(defaults)?;
    if let (Value::Object(base), Value::Object(fields)) = (&mut merged, partial) {
        base.extend(fields);
    }
    serde_json::from_value(merged)
}

/// Periodically reloads `path` into `overrides`.
pub fn spawn_reload_task(
    overrides: Arc<Overrides>,
    path: PathBuf,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match overrides.reload_from_file(&path) {
                Ok(tenants) => {
                    debug!(tenants, path = %path.display(), "reloaded runtime config");
                }
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "failed to reload runtime config");
                }
            }
        }
    })
}

/// Builds overrides on top of `defaults`, layering the runtime config file
/// over them when one is configured.
pub fn load_overrides(
    path: Option<&Path>,
    defaults: LimitsConfig,
) -> Result<Arc<Overrides>, OverridesError> {
    let overrides = match path {
        Some(path) => {
            let overrides = Overrides::load_file_with_base(path, defaults)?;
            info!(
                path = %path.display(),
                tenants = overrides.tenant_count(),
                "loaded runtime config"
            );
            overrides
        }
        None => Overrides::new(defaults),
    };
    Ok(Arc::new(overrides))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn write_config(file: &mut NamedTempFile, value: serde_json::Value) {
        file.as_file_mut().set_len(0).unwrap();
        let mut handle = file.reopen().unwrap();
        handle.write_all(value.to_string().as_bytes()).unwrap();
    }

    #[test]
    fn unknown_tenant_gets_defaults() {
        let overrides = Overrides::new(LimitsConfig::default());
        assert_eq!(overrides.tenant_limits("nobody"), LimitsConfig::default());
        assert_eq!(overrides.max_chunks_per_query("nobody"), 2_000_000);
    }

    #[test]
    fn partial_overrides_merge_onto_defaults() {
        let overrides = Overrides::default();
        let config: RuntimeConfig = serde_json::from_value(json!({
            "defaults": { "max_chunks_per_query": 100 },
            "overrides": { "team-a": { "max_series_per_query": 7 } }
        }))
        .unwrap();

        assert_eq!(overrides.apply(config).unwrap(), 1);
        assert_eq!(overrides.max_chunks_per_query("team-a"), 100);
        assert_eq!(overrides.max_series_per_query("team-a"), 7);
        assert_eq!(overrides.max_series_per_query("team-b"), 0);
        assert_eq!(overrides.defaults().max_label_names_per_series, 30);
    }

    #[test]
    fn invalid_override_keeps_previous_config() {
        let overrides = Overrides::default();
        overrides.set_tenant_limits(
            "team-a",
            LimitsConfig {
                max_series_per_query: 3,
                ..LimitsConfig::default()
            },
        );

        let config: RuntimeConfig = serde_json::from_value(json!({
            "overrides": { "team-a": { "max_series_per_query": "lots" } }
        }))
        .unwrap();

        let err = overrides.apply(config).unwrap_err();
        assert!(matches!(err, OverridesError::InvalidOverride { ref tenant_id, .. } if tenant_id == "team-a"));
        assert_eq!(overrides.max_series_per_query("team-a"), 3);
    }

    #[test]
    fn reload_replaces_and_removes_tenants() {
        let mut file = NamedTempFile::new().unwrap();
        write_config(
            &mut file,
            json!({ "overrides": { "a": { "max_chunks_per_query": 1 }, "b": {} } }),
        );
        let overrides = Overrides::load_file(file.path()).unwrap();
        assert_eq!(overrides.tenant_count(), 2);
        assert_eq!(overrides.max_chunks_per_query("a"), 1);

        write_config(
            &mut file,
            json!({ "overrides": { "a": { "max_chunks_per_query": 5 } } }),
        );
        assert_eq!(overrides.reload_from_file(file.path()).unwrap(), 1);
        assert_eq!(overrides.max_chunks_per_query("a"), 5);
        assert!(overrides.remove_tenant("b").is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Overrides::load_file(Path::new("/nonexistent/runtime.json")).unwrap_err();
        assert!(matches!(err, OverridesError::Io { .. }));
    }

    #[test]
    fn load_overrides_without_path_uses_defaults() {
        let defaults = LimitsConfig {
            max_series_per_query: 11,
            ..LimitsConfig::default()
        };
        let overrides = load_overrides(None, defaults.clone()).unwrap();
        assert_eq!(overrides.tenant_limits("any"), defaults);
    }

    #[test]
    fn runtime_file_layers_over_configured_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write_config(
            &mut file,
            json!({ "overrides": { "a": { "max_series_per_query": 3 } } }),
        );
        let base = LimitsConfig {
            max_series_per_query: 11,
            max_chunks_per_query: 5,
            ..LimitsConfig::default()
        };

        let overrides = load_overrides(Some(file.path()), base.clone()).unwrap();
        assert_eq!(overrides.tenant_limits("other"), base);
        assert_eq!(overrides.max_series_per_query("a"), 3);
        assert_eq!(overrides.max_chunks_per_query("a"), 5);

        write_config(&mut file, json!({ "defaults": { "max_chunks_per_query": 9 } }));
        assert_eq!(overrides.reload_from_file(file.path()).unwrap(), 0);
        assert_eq!(overrides.max_chunks_per_query("other"), 9);
        assert_eq!(overrides.max_series_per_query("other"), 11);
        assert_eq!(overrides.max_series_per_query("a"), 11);
        assert_eq!(overrides.base(), &base);
    }

    #[test]
    fn invalid_defaults_keep_previous_config() {
        let overrides = Overrides::new(LimitsConfig {
            max_chunks_per_query: 7,
            ..LimitsConfig::default()
        });
        let config: RuntimeConfig = serde_json::from_value(json!({
            "defaults": { "max_chunks_per_query": -1 }
        }))
        .unwrap();

        assert!(matches!(
            overrides.apply(config),
            Err(OverridesError::InvalidDefaults(_))
        ));
        assert_eq!(overrides.max_chunks_per_query("any"), 7);
    }

    #[test]
    fn readers_keep_their_snapshot_across_apply() {
        let overrides = Overrides::default();
        overrides.set_tenant_limits(
            "a",
            LimitsConfig {
                max_series_per_query: 3,
                ..LimitsConfig::default()
            },
        );
        let before = overrides.snapshot();

        let config: RuntimeConfig = serde_json::from_value(json!({
            "defaults": { "max_series_per_query": 8 }
        }))
        .unwrap();
        overrides.apply(config).unwrap();

        assert_eq!(before.tenants["a"].max_series_per_query, 3);
        assert_eq!(before.defaults.max_series_per_query, 0);
        assert_eq!(overrides.max_series_per_query("a"), 8);
        assert_eq!(overrides.tenant_count(), 0);
    }

    #[tokio::test]
    async fn reload_task_picks_up_changes() {
        let mut file = NamedTempFile::new().unwrap();
        write_config(&mut file, json!({ "defaults": { "max_series_per_query": 1 } }));
        let overrides = Arc::new(Overrides::load_file(file.path()).unwrap());

        let handle = spawn_reload_task(
            Arc::clone(&overrides),
            file.path().to_path_buf(),
            Duration::from_millis(10),
        );
        write_config(&mut file, json!({ "defaults": { "max_series_per_query": 2 } }));

        let mut observed = 0;
        for _ in 0..100 {
            observed = overrides.max_series_per_query("any");
            if observed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert_eq!(observed, 2);
    }
}
