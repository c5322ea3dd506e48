use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::SeriesEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub series: Vec<SeriesEntry>,
}

/// Queries dropped per resource kind since startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitFailuresResponse {
    pub failures: BTreeMap<String, u64>,
}
