//! Coordination primitives built on a shared key-value store.
//!
//! - `LockManager` - Named mutual exclusion with automatic expiry
//! - `CounterStore` - Race-free increment/decrement
//! - `RangeStore` - Scored sets consumed exactly once
//! - `FutureStore` - Cross-process rendezvous on a keyed result
//!
//! Every primitive is written against [`cairn_core::KeyValueStore`]. All
//! cross-process atomicity comes from single store commands; nothing here
//! relies on a client-side read followed by a write.
//!
//! ## Lock Example
//!
//! ```ignore
//! use cairn_coordination::{LockConfig, LockManager};
//!
//! let locks = LockManager::new(store, LockConfig::default());
//! let guard = locks.acquire("job-42", Some(Duration::from_secs(5))).await?;
//!
//! // Protected critical section
//!
//! guard.release().await?;
//! ```
//!
//! ## Future Example
//!
//! ```ignore
//! use cairn_coordination::{FutureConfig, FutureStore};
//!
//! let futures: FutureStore<Report> = FutureStore::new(store, FutureConfig::default());
//! let pending = futures.create("report-17")?;
//!
//! // ...elsewhere, possibly another process:
//! futures.complete("report-17", &report).await?;
//!
//! let report = pending.await?;
//! ```

mod counter;
mod error;
mod future;
mod lock;
mod range;
mod types;

pub use counter::CounterConfig;
pub use counter::CounterStore;
pub use error::CoordinationError;
pub use future::FutureConfig;
pub use future::FutureStore;
pub use future::PendingResult;
pub use lock::LockConfig;
pub use lock::LockGuard;
pub use lock::LockManager;
pub use range::RangeConfig;
pub use range::RangeStore;
pub use types::now_unix_ms;
