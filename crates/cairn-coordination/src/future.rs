//! Cross-process futures: one side waits for a keyed result, any other side
//! supplies it.
//!
//! `create` hands back a [`PendingResult`] straight away and starts a
//! background task that polls the store. The task consumes the result with
//! an atomic take, so a completion is delivered to exactly one waiter even
//! when several processes poll the same key.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use cairn_core::Codec;
use cairn_core::JsonCodec;
use cairn_core::KeyValueStore;
use cairn_core::WriteRequest;
use cairn_core::constants::DEFAULT_FUTURE_POLL_INTERVAL_MS;
use cairn_core::constants::DEFAULT_FUTURE_RESULT_TTL_MS;
use cairn_core::constants::DEFAULT_FUTURE_TIMEOUT_MS;
use cairn_core::constants::MAX_KEY_SIZE;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::error::CancelledSnafu;
use crate::error::CodecSnafu;
use crate::error::CoordinationError;
use crate::error::InvalidArgumentSnafu;
use crate::error::TimeoutSnafu;
use crate::error::ensure_non_empty;
use crate::types::effective_timeout;

/// Configuration for a future store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureConfig {
    #[serde(default = "default_future_prefix")]
    pub key_prefix: String,
    /// How long a completed but uncollected result is retained.
    #[serde(default = "default_result_ttl_ms")]
    pub result_ttl_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Default wait bound for [`FutureStore::create`]. Zero waits forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_future_prefix() -> String {
    "future:".to_string()
}

fn default_result_ttl_ms() -> u64 {
    DEFAULT_FUTURE_RESULT_TTL_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_FUTURE_POLL_INTERVAL_MS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_FUTURE_TIMEOUT_MS
}

impl Default for FutureConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_future_prefix(),
            result_ttl_ms: DEFAULT_FUTURE_RESULT_TTL_MS,
            poll_interval_ms: DEFAULT_FUTURE_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_FUTURE_TIMEOUT_MS,
        }
    }
}

/// Creates, completes and collects keyed results of type `T`.
pub struct FutureStore<T, S: KeyValueStore + ?Sized + 'static = dyn KeyValueStore, C = JsonCodec> {
    store: Arc<S>,
    codec: Arc<C>,
    config: FutureConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: KeyValueStore + ?Sized + 'static, C> Clone for FutureStore<T, S, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, S: KeyValueStore + ?Sized + 'static, C: Default> FutureStore<T, S, C> {
    pub fn new(store: Arc<S>, config: FutureConfig) -> Self {
        Self::with_codec(store, C::default(), config)
    }
}

impl<T, S: KeyValueStore + ?Sized + 'static, C> FutureStore<T, S, C> {
    pub fn with_codec(store: Arc<S>, codec: C, config: FutureConfig) -> Self {
        Self {
            store,
            codec: Arc::new(codec),
            config,
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &FutureConfig {
        &self.config
    }

    fn future_key(&self, key: &str) -> Result<String, CoordinationError> {
        ensure_non_empty("future key", key)?;
        let store_key = format!("{}{}", self.config.key_prefix, key);
        if store_key.len() > MAX_KEY_SIZE as usize {
            return InvalidArgumentSnafu {
                reason: format!("future key is {} bytes, limit is {MAX_KEY_SIZE}", store_key.len()),
            }
            .fail();
        }
        Ok(store_key)
    }
}

impl<T, S, C> FutureStore<T, S, C>
where
    T: Send + 'static,
    S: KeyValueStore + ?Sized + 'static,
    C: Codec<T> + 'static,
{
    /// Start waiting for `key` with the configured timeout.
    pub fn create(&self, key: &str) -> Result<PendingResult<T>, CoordinationError> {
        self.create_with_timeout(key, Duration::from_millis(self.config.timeout_ms))
    }

    /// Start waiting for `key`, giving up after `timeout` (zero waits forever).
    ///
    /// Returns without touching the store; polling happens on a spawned task
    /// that stops once the handle resolves or is dropped.
    pub fn create_with_timeout(&self, key: &str, timeout: Duration) -> Result<PendingResult<T>, CoordinationError> {
        let store_key = self.future_key(key)?;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return InvalidArgumentSnafu {
                reason: "futures must be created inside a Tokio runtime",
            }
            .fail();
        };

        let (tx, rx) = oneshot::channel();
        let poller = Poller {
            store: self.store.clone(),
            key: key.to_string(),
            store_key: store_key.clone(),
            poll_interval: Duration::from_millis(self.config.poll_interval_ms.max(1)),
            deadline: effective_timeout(Some(timeout)).map(|t| Instant::now() + t),
            result_ttl_ms: self.config.result_ttl_ms,
        };
        debug!(key = %key, timeout_ms = timeout.as_millis() as u64, "future created");
        runtime.spawn(poller.run(tx));

        let restore: RestoreFn = {
            let store = self.store.clone();
            let store_key = store_key.clone();
            let ttl_ms = self.config.result_ttl_ms;
            Box::new(move |raw| {
                runtime.spawn(async move { restore_result(store.as_ref(), &store_key, raw, ttl_ms).await });
            })
        };

        Ok(PendingResult {
            key: key.to_string(),
            store_key,
            rx,
            codec: self.codec.clone(),
            restore: Some(restore),
        })
    }

    /// Publish the result for `key`. Safe to call from any process.
    ///
    /// The result is kept for `result_ttl_ms` if nobody collects it.
    pub async fn complete(&self, key: &str, value: &T) -> Result<(), CoordinationError> {
        let store_key = self.future_key(key)?;
        let encoded = self.codec.encode(value).context(CodecSnafu { key: store_key.clone() })?;
        self.store.write(WriteRequest::set_with_ttl(&store_key, encoded, self.config.result_ttl_ms)).await?;
        debug!(key = %store_key, "future completed");
        Ok(())
    }

    /// Collect the result for `key` if present, removing it.
    ///
    /// Of any number of concurrent takers, at most one receives the value.
    pub async fn take(&self, key: &str) -> Result<Option<T>, CoordinationError> {
        let store_key = self.future_key(key)?;
        let result = self.store.write(WriteRequest::take(&store_key)).await?;
        match result.value {
            Some(raw) => Ok(Some(self.codec.decode(&raw).context(CodecSnafu { key: store_key })?)),
            None => Ok(None),
        }
    }
}

/// Raw payload taken from the store, or the reason the wait ended.
type Delivery = Result<String, CoordinationError>;

type RestoreFn = Box<dyn FnOnce(String) + Send>;

struct Poller<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    key: String,
    store_key: String,
    poll_interval: Duration,
    deadline: Option<Instant>,
    result_ttl_ms: u64,
}

impl<S: KeyValueStore + ?Sized + 'static> Poller<S> {
    async fn run(self, mut tx: oneshot::Sender<Delivery>) {
        loop {
            if tx.is_closed() {
                debug!(key = %self.store_key, "future abandoned, stopping poll");
                return;
            }

            match self.store.write(WriteRequest::take(&self.store_key)).await {
                Ok(result) => {
                    if let Some(raw) = result.value {
                        if let Err(Ok(raw)) = tx.send(Ok(raw)) {
                            restore_result(self.store.as_ref(), &self.store_key, raw, self.result_ttl_ms).await;
                        }
                        return;
                    }
                }
                Err(e) if e.is_connectivity() => {
                    warn!(key = %self.store_key, error = %e, "future poll failed, retrying");
                }
                Err(e) => {
                    warn!(key = %self.store_key, error = %e, "future poll rejected by store");
                    let _ = tx.send(Err(e.into()));
                    return;
                }
            }

            let mut sleep = self.poll_interval;
            if let Some(deadline) = self.deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!(key = %self.store_key, "future timed out");
                    let _ = tx.send(
                        TimeoutSnafu {
                            operation: format!("await future '{}'", self.key),
                        }
                        .fail(),
                    );
                    return;
                }
                sleep = sleep.min(remaining);
            }

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = tx.closed() => {
                    debug!(key = %self.store_key, "future abandoned, stopping poll");
                    return;
                }
            }
        }
    }
}

/// Put back a result that was taken but never handed to a waiter.
async fn restore_result<S: KeyValueStore + ?Sized>(store: &S, store_key: &str, raw: String, ttl_ms: u64) {
    match store.write(WriteRequest::set_if_absent(store_key, raw, Some(ttl_ms))).await {
        Ok(_) => debug!(key = %store_key, "uncollected future result restored"),
        Err(e) => warn!(key = %store_key, error = %e, "failed to restore uncollected future result"),
    }
}

/// Handle to a result that another party will supply.
///
/// Awaiting it yields the decoded value, a `Timeout`, a `Codec` error for a
/// malformed payload, or `Cancelled` after [`PendingResult::cancel`].
/// Dropping it stops the background poll; a result the poll already took
/// is written back to the store.
pub struct PendingResult<T> {
    key: String,
    store_key: String,
    rx: oneshot::Receiver<Delivery>,
    codec: Arc<dyn Codec<T>>,
    restore: Option<RestoreFn>,
}

impl<T> PendingResult<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop waiting. A subsequent await resolves with `Cancelled`.
    pub fn cancel(&mut self) {
        self.rx.close();
        self.return_undelivered();
    }

    fn return_undelivered(&mut self) {
        if let Ok(Ok(raw)) = self.rx.try_recv()
            && let Some(restore) = self.restore.take()
        {
            restore(raw);
        }
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T, CoordinationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Ok(raw))) => {
                self.restore = None;
                Poll::Ready(self.codec.decode(&raw).context(CodecSnafu {
                    key: self.store_key.clone(),
                }))
            }
            Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(e)),
            Poll::Ready(Err(_)) => Poll::Ready(
                CancelledSnafu {
                    operation: format!("await future '{}'", self.key),
                }
                .fail(),
            ),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for PendingResult<T> {
    fn drop(&mut self) {
        self.rx.close();
        self.return_undelivered();
    }
}

impl<T> std::fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult").field("key", &self.key).finish()
    }
}
