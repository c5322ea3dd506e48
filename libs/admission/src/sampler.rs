//! Log-volume control for rejections that can repeat at very high rates.

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::BoxError;

/// Lets one in every `freq` errors through to the logs.
#[derive(Debug)]
pub struct Sampler {
    freq: u64,
    count: AtomicU64,
}

impl Sampler {
    /// `freq` of 0 or 1 samples every error.
    pub fn new(freq: u64) -> Self {
        Self {
            freq: freq.max(1),
            count: AtomicU64::new(0),
        }
    }

    pub fn freq(&self) -> u64 {
        self.freq
    }

    pub fn sample(&self) -> bool {
        if self.freq == 1 {
            return true;
        }
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        count % self.freq == 0
    }

    pub fn wrap_error(sampler: Option<&Arc<Sampler>>, err: impl Into<BoxError>) -> SampledError {
        SampledError {
            err: err.into(),
            sampler: sampler.cloned(),
        }
    }
}

/// An error whose logging is rate limited. The message is the wrapped error's
/// message unchanged.
#[derive(Debug)]
pub struct SampledError {
    err: BoxError,
    sampler: Option<Arc<Sampler>>,
}

impl SampledError {
    /// Whether this occurrence should be logged, and the reason to attach.
    pub fn should_log(&self) -> (bool, Option<String>) {
        match &self.sampler {
            Some(sampler) if sampler.freq() > 1 => {
                (sampler.sample(), Some(format!("sampled 1/{}", sampler.freq())))
            }
            _ => (true, None),
        }
    }

    /// Emits a warning for this error if the sampler lets it through.
    pub fn log(&self, tenant_id: &str) {
        match self.should_log() {
            (true, Some(reason)) => warn!(tenant_id, reason = %reason, error = %self, "request rejected"),
            (true, None) => warn!(tenant_id, error = %self, "request rejected"),
            (false, _) => {}
        }
    }

    pub fn into_inner(self) -> BoxError {
        self.err
    }
}

impl fmt::Display for SampledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl StdError for SampledError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.err.as_ref())
    }
}
