use serde::{Deserialize, Serialize};

use crate::ingester::IngestStatsSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: IngestStatsSnapshot,
}
