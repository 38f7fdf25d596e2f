//! Request-scoped batching of entity lookups.
//!
//! `load` registers its key synchronously and hands back a future. Nothing is
//! fetched until that future has yielded to the scheduler once, so every
//! `load` issued in the same tick ends up in one bulk fetch. Keys are sent to
//! the fetcher deduplicated, in the order they were first requested, and each
//! caller gets its own answer: the value, `None` when the store has no such
//! key, or the fetch error.
//!
//! There is no cache. A key loaded again in a later tick is fetched again, and
//! a loader must not outlive the request that created it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The bulk fetch failed; every caller in that batch gets this.
    #[error("batch fetch failed: {0}")]
    Store(String),

    /// The batch was dropped before it resolved.
    #[error("batch cancelled")]
    Cancelled,
}

/// Bulk fetch behind a loader. Keys missing from the returned map resolve to
/// `None` for their callers.
pub trait BatchFn<K, V>: Send + Sync + 'static {
    fn fetch(&self, keys: Vec<K>) -> impl Future<Output = Result<HashMap<K, V>, LoadError>> + Send;
}

type Reply<V> = oneshot::Sender<Result<Option<V>, LoadError>>;

struct Batch<K, V> {
    generation: u64,
    /// In call order, duplicates included.
    waiters: Vec<(K, Reply<V>)>,
}

impl<K, V> Batch<K, V> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            waiters: Vec::new(),
        }
    }
}

struct Inner<K, V, F> {
    fetcher: F,
    pending: Mutex<Batch<K, V>>,
}

pub struct BatchLoader<K, V, F> {
    inner: Arc<Inner<K, V, F>>,
}

impl<K, V, F> Clone for BatchLoader<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, F> BatchLoader<K, V, F>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
    F: BatchFn<K, V>,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                pending: Mutex::new(Batch::new(0)),
            }),
        }
    }

    /// Queue `key` for the current batch. The key is registered before this
    /// returns; the fetch happens once the returned future is awaited.
    pub fn load(
        &self,
        key: K,
    ) -> impl Future<Output = Result<Option<V>, LoadError>> + Send + 'static + use<K, V, F> {
        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut batch = self.inner.lock_pending();
            batch.waiters.push((key, tx));
            batch.generation
        };

        let inner = Arc::clone(&self.inner);
        async move {
            // Let every other caller in this tick register first
            tokio::task::yield_now().await;
            inner.dispatch(generation).await;
            rx.await.unwrap_or(Err(LoadError::Cancelled))
        }
    }

    /// Load several keys in one batch. Results line up with `keys`,
    /// duplicates included.
    pub async fn load_many<I>(&self, keys: I) -> Vec<Result<Option<V>, LoadError>>
    where
        I: IntoIterator<Item = K>,
    {
        join_all(keys.into_iter().map(|key| self.load(key))).await
    }
}

impl<K, V, F> Inner<K, V, F>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
    F: BatchFn<K, V>,
{
    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Batch<K, V>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close batch `generation` and fetch it, unless another caller from the
    /// same batch already did.
    async fn dispatch(&self, generation: u64) {
        let batch = {
            let mut pending = self.lock_pending();
            if pending.generation != generation {
                return;
            }
            std::mem::replace(&mut *pending, Batch::new(generation + 1))
        };

        // Callers dropped before the batch closed no longer want their keys
        let waiters: Vec<(K, Reply<V>)> = batch
            .waiters
            .into_iter()
            .filter(|(_, reply)| !reply.is_closed())
            .collect();
        if waiters.is_empty() {
            return;
        }

        let mut seen = HashSet::new();
        let keys: Vec<K> = waiters
            .iter()
            .filter(|(key, _)| seen.insert(key.clone()))
            .map(|(key, _)| key.clone())
            .collect();
        debug!(generation, keys = keys.len(), callers = waiters.len(), "dispatching batch");

        match self.fetcher.fetch(keys).await {
            Ok(found) => {
                for (key, reply) in waiters {
                    // Receiver gone means that caller was dropped
                    let _ = reply.send(Ok(found.get(&key).cloned()));
                }
            }
            Err(e) => {
                warn!(generation, "batch fetch failed: {}", e);
                for (_, reply) in waiters {
                    let _ = reply.send(Err(e.clone()));
                }
            }
        }
    }
}
