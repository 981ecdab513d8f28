pub mod cache;
pub mod config;
pub mod constants;
pub mod feeds;
pub mod models;
pub mod nostr;
pub mod reconcile;
pub mod stats;
pub mod tracing_setup;
pub mod validation;

pub use config::{ConfigStorage, CoreConfig, RelayConfig};
pub use feeds::{merge_article_pages, ArticlePage, ContentFeeds};
pub use models::{QueryFilter, Record};
pub use nostr::{PoolChange, PoolError, QueryOptions, RelayPool};
pub use reconcile::{deduplicate, filter_deleted, reconcile};
