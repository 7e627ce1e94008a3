//! Replay counters for CASA nonces.
//!
//! # Design Decisions
//! - Counting is an atomic increment-and-read keyed by nonce
//! - Counters expire after a window so the store stays bounded
//! - [`InMemoryNonceStore`] is correct for one process only; multi-process
//!   deployments plug a shared store with atomic INCR behind [`NonceStore`]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NonceStoreError {
    #[error("nonce store unavailable: {0}")]
    Unavailable(String),

    #[error("nonce store timed out")]
    Timeout,
}

/// Shared, atomically incremented use counters.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Increment the counter for `nonce` and return the new value.
    /// A fresh or expired counter starts over at 1 with a new `window`.
    async fn increment(&self, nonce: &str, window: Duration) -> Result<u64, NonceStoreError>;
}

#[derive(Debug, Clone, Copy)]
struct NonceEntry {
    count: u64,
    expires_at: Instant,
}

/// Process-local counter store backed by a [`DashMap`].
#[derive(Clone, Default)]
pub struct InMemoryNonceStore {
    inner: Arc<DashMap<String, NonceEntry>>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Purge expired counters every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = store.len(),
                                "Purged expired nonce counters"
                            );
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn increment(&self, nonce: &str, window: Duration) -> Result<u64, NonceStoreError> {
        let now = Instant::now();
        // The entry guard holds the shard lock, making increment-and-read atomic.
        let mut entry = self.inner.entry(nonce.to_string()).or_insert(NonceEntry {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;
        Ok(entry.count)
    }
}
