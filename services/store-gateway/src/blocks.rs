use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsdb_guard_admission::LabelSet;

#[derive(Debug, Error)]
pub enum BlocksError {
    #[error("failed to read blocks file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse blocks file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chunk {
    pub min_time_ms: i64,
    pub max_time_ms: i64,
    pub num_samples: u32,
}

impl Chunk {
    pub fn overlaps(&self, min_time_ms: i64, max_time_ms: i64) -> bool {
        self.min_time_ms <= max_time_ms && self.max_time_ms >= min_time_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSeries {
    pub labels: LabelSet,
    pub chunks: Vec<Chunk>,
}

/// One partition of a tenant's data, scanned by a single worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub series: Vec<StoredSeries>,
}

impl Block {
    pub fn new(id: impl Into<String>, series: Vec<StoredSeries>) -> Self {
        Self {
            id: id.into(),
            series,
        }
    }

    /// Time range covered by the block's chunks, if it has any.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        self.series
            .iter()
            .flat_map(|series| series.chunks.iter())
            .fold(None, |range, chunk| match range {
                None => Some((chunk.min_time_ms, chunk.max_time_ms)),
                Some((min, max)) => Some((min.min(chunk.min_time_ms), max.max(chunk.max_time_ms))),
            })
    }

    pub fn overlaps(&self, min_time_ms: i64, max_time_ms: i64) -> bool {
        match self.time_range() {
            Some((min, max)) => min <= max_time_ms && max >= min_time_ms,
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct BlockStore {
    tenants: DashMap<String, Vec<Arc<Block>>>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{ "<tenant>": [block, ...] }` from a JSON file.
    pub fn load_file(path: &Path) -> Result<Self, BlocksError> {
        let raw = fs::read_to_string(path).map_err(|source| BlocksError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tenants: HashMap<String, Vec<Block>> = serde_json::from_str(&raw)?;

        let store = Self::new();
        for (tenant_id, blocks) in tenants {
            for block in blocks {
                store.add_block(&tenant_id, block);
            }
        }
        Ok(store)
    }

    pub fn add_block(&self, tenant_id: &str, block: Block) {
        self.tenants
            .entry(tenant_id.to_string())
            .or_default()
            .push(Arc::new(block));
    }

    pub fn blocks(&self, tenant_id: &str) -> Vec<Arc<Block>> {
        self.tenants
            .get(tenant_id)
            .map(|blocks| blocks.clone())
            .unwrap_or_default()
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use serde_json::json;

    fn chunk(min: i64, max: i64) -> Chunk {
        Chunk {
            min_time_ms: min,
            max_time_ms: max,
            num_samples: 120,
        }
    }

    #[test]
    fn block_time_range_spans_all_chunks() {
        let block = Block::new(
            "01",
            vec![
                StoredSeries {
                    labels: LabelSet::from_pairs([("__name__", "up")]),
                    chunks: vec![chunk(10, 20), chunk(21, 30)],
                },
                StoredSeries {
                    labels: LabelSet::from_pairs([("__name__", "down")]),
                    chunks: vec![chunk(5, 8)],
                },
            ],
        );

        assert_eq!(block.time_range(), Some((5, 30)));
        assert!(block.overlaps(30, 40));
        assert!(!block.overlaps(31, 40));
        assert!(!Block::new("empty", vec![]).overlaps(i64::MIN, i64::MAX));
    }

    #[test]
    fn loads_blocks_per_tenant() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = json!({
            "tenant-a": [
                { "id": "b1", "series": [] },
                { "id": "b2", "series": [] }
            ],
            "tenant-b": [ { "id": "b3", "series": [] } ]
        });
        file.write_all(content.to_string().as_bytes()).unwrap();

        let store = BlockStore::load_file(file.path()).unwrap();
        assert_eq!(store.tenant_count(), 2);
        assert_eq!(store.blocks("tenant-a").len(), 2);
        assert!(store.blocks("tenant-c").is_empty());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        assert!(matches!(
            BlockStore::load_file(file.path()),
            Err(BlocksError::Parse(_))
        ));
    }
}
