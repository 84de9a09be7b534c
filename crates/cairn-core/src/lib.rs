//! Shared key-value store abstraction for cairn coordination primitives.
//!
//! This crate provides the store interface every primitive is written
//! against, the command vocabulary that interface accepts, and the backends
//! that implement it.
//!
//! # Key Components
//!
//! - **Traits**: `KeyValueStore`, `Codec`
//! - **Types**: `WriteCommand`, `WriteRequest`, `ReadRequest`, `ScanRequest`, etc.
//! - **Backends**: `DeterministicKeyValueStore` (in-process), `RedisKeyValueStore`
//! - **Constants**: resource bounds and primitive defaults
//!
//! # Feature Flags
//!
//! - `redis` (default): Include the Redis backend

pub mod codec;
pub mod constants;
pub mod error;
pub mod factory;
pub mod inmemory;
pub mod kv;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod traits;

// Re-export all public types at crate root for convenience

// Codecs
pub use codec::Codec;
pub use codec::JsonCodec;
pub use codec::PlainCodec;
// Constants
pub use constants::DEFAULT_SCAN_LIMIT;
pub use constants::MAX_BATCH_KEYS;
pub use constants::MAX_KEY_SIZE;
pub use constants::MAX_RANGE_BATCH;
pub use constants::MAX_SCAN_RESULTS;
pub use constants::MAX_VALUE_SIZE;
// Errors
pub use error::CodecError;
pub use error::KeyValueStoreError;
// Backends
pub use factory::StoreBackend;
pub use factory::StoreConfig;
pub use factory::connect_store;
pub use inmemory::DeterministicKeyValueStore;
// KV types
pub use kv::DeleteRequest;
pub use kv::DeleteResult;
pub use kv::KeyValueEntry;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::ScanRequest;
pub use kv::ScanResult;
pub use kv::ScoredMember;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use kv::validate_write_command;
#[cfg(feature = "redis")]
pub use redis_store::RedisKeyValueStore;
// Traits
pub use traits::KeyValueStore;
