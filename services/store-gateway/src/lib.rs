pub mod api;
pub mod blocks;
pub mod bucket;
pub mod config;
pub mod query;

pub use api::{create_router, ApiState};
pub use blocks::{Block, BlockStore, BlocksError, Chunk, StoredSeries};
pub use bucket::BucketStore;
pub use config::StoreGatewayConfig;
pub use query::{LabelMatcher, QueryError, SeriesEntry, SeriesQuery};
