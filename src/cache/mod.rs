//! Delivery tiers and the resolver that cascades through them.
//!
//! - [`RecencyCache`]: bounded FIFO memory of recent network successes
//! - [`SqliteStorage`]: durable offline store, seeded at startup and pruned by age
//! - [`SyntheticTable`]: generic content that guarantees an answer
//! - [`FallbackResolver`]: network (with retries) → cache → offline store → synthetic

mod layer;
mod recency;
mod storage;
mod synthetic;
mod traits;

pub use layer::FallbackResolver;
pub use recency::RecencyCache;
pub use storage::{OfflineItem, OfflineStorage, Origin, SqliteStorage};
pub use synthetic::{default_json_table, SyntheticTable};
pub use traits::{Content, FetchResult, SourceTier};
