use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsdb_guard_admission::{status, ClassifiedError, HttpResponse, LabelSet};

use crate::blocks::Chunk;

/// Equality matcher. An empty value matches series without the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatcher {
    pub name: String,
    pub value: String,
}

impl LabelMatcher {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, labels: &LabelSet) -> bool {
        labels.get(&self.name).unwrap_or_default() == self.value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesQuery {
    pub matchers: Vec<LabelMatcher>,
    #[serde(default = "min_time")]
    pub min_time_ms: i64,
    #[serde(default = "max_time")]
    pub max_time_ms: i64,
}

fn min_time() -> i64 {
    i64::MIN
}

fn max_time() -> i64 {
    i64::MAX
}

impl SeriesQuery {
    pub fn new(matchers: Vec<LabelMatcher>) -> Self {
        Self {
            matchers,
            min_time_ms: min_time(),
            max_time_ms: max_time(),
        }
    }

    pub fn with_time_range(mut self, min_time_ms: i64, max_time_ms: i64) -> Self {
        self.min_time_ms = min_time_ms;
        self.max_time_ms = max_time_ms;
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.min_time_ms > self.max_time_ms {
            return Err(QueryError::InvalidQuery(format!(
                "invalid time range: min time {} is after max time {}",
                self.min_time_ms, self.max_time_ms
            )));
        }
        if !self.matchers.iter().any(|matcher| !matcher.value.is_empty()) {
            return Err(QueryError::InvalidQuery(
                "at least one matcher with a non-empty value is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn matches(&self, labels: &LabelSet) -> bool {
        self.matchers.iter().all(|matcher| matcher.matches(labels))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub labels: LabelSet,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Limit(#[from] ClassifiedError),
    #[error("scan worker failed: {0}")]
    Worker(String),
}

impl QueryError {
    pub fn to_http_response(&self) -> HttpResponse {
        match self {
            QueryError::InvalidQuery(message) => HttpResponse::new(status::VALIDATION, message.as_str()),
            QueryError::Limit(err) => HttpResponse::from_error(err),
            QueryError::Worker(_) => HttpResponse::new(status::INTERNAL, self.to_string()),
        }
    }
}
