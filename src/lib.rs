//! Coordination primitives over a shared key-value store.
//!
//! - [`LockManager`]: named mutual exclusion with automatic expiry
//! - [`TieredCache`]: local + shared cache with single-flight loading
//! - [`FutureStore`]: cross-process rendezvous on a keyed result
//! - [`CounterStore`] / [`RangeStore`]: atomic counters and scored sets
//!
//! Build them directly from a store, or through a [`Coordinator`] configured
//! by an [`AppConfig`].
//!
//! # Feature Flags
//!
//! - `redis` (default): Redis-backed shared store

pub mod config;
mod coordinator;

pub use cairn_cache::CacheConfig;
pub use cairn_cache::CacheError;
pub use cairn_cache::CacheKey;
pub use cairn_cache::CacheStatsSnapshot;
pub use cairn_cache::HashedKey;
pub use cairn_cache::Loaded;
pub use cairn_cache::SharedLayer;
pub use cairn_cache::TieredCache;
pub use cairn_coordination::CoordinationError;
pub use cairn_coordination::CounterConfig;
pub use cairn_coordination::CounterStore;
pub use cairn_coordination::FutureConfig;
pub use cairn_coordination::FutureStore;
pub use cairn_coordination::LockConfig;
pub use cairn_coordination::LockGuard;
pub use cairn_coordination::LockManager;
pub use cairn_coordination::PendingResult;
pub use cairn_coordination::RangeConfig;
pub use cairn_coordination::RangeStore;
pub use cairn_core::Codec;
pub use cairn_core::DeterministicKeyValueStore;
pub use cairn_core::JsonCodec;
pub use cairn_core::KeyValueStore;
pub use cairn_core::KeyValueStoreError;
pub use cairn_core::PlainCodec;
pub use cairn_core::ScoredMember;
pub use cairn_core::StoreBackend;
pub use cairn_core::StoreConfig;
pub use cairn_core::connect_store;
pub use config::AppConfig;
pub use config::ConfigError;
pub use coordinator::Coordinator;
pub use coordinator::CoordinatorError;
