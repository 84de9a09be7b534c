//! Two-tier cache over a shared key-value store.
//!
//! Each [`TieredCache`] keeps a bounded process-local layer in front of a
//! [`SharedLayer`] backed by any [`cairn_core::KeyValueStore`]. Values are
//! encoded with a pluggable [`cairn_core::Codec`] (JSON by default).
//!
//! ## Example
//!
//! ```ignore
//! use cairn_cache::{CacheConfig, SharedLayer, TieredCache};
//!
//! let users: TieredCache<User> = TieredCache::new(SharedLayer::Store(store), CacheConfig::default());
//! let user = users
//!     .get_or_compute("user:7", |_| fetch_user(7), Some(Duration::from_secs(300)))
//!     .await?;
//! ```

mod error;
mod key;
mod local;
mod shared;
mod stats;
mod tiered;

pub use error::CacheError;
pub use error::LoaderError;
pub use key::CacheKey;
pub use key::HashedKey;
pub use shared::SharedEntry;
pub use shared::SharedLayer;
pub use stats::CacheStats;
pub use stats::CacheStatsSnapshot;
pub use tiered::CacheConfig;
pub use tiered::Loaded;
pub use tiered::TieredCache;
