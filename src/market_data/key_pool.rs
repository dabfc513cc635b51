// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Key Pool
//!
//! Rotates the market-data API keys, each with a per-minute request quota.
//!
//! ## Selection
//!
//! [`KeyPool::acquire`] scans keys left to right and takes the first one with
//! quota left. There is no fairness beyond scan order: under sustained load
//! the first key is always drained before later keys are touched, so later
//! keys see little traffic until earlier ones run dry. When every key is
//! exhausted, `acquire` returns `None` and the caller proceeds without a key
//! (the provider then rejects the call).
//!
//! ## Reset
//!
//! [`KeyPool::run_resets`] restores every key's quota together once per
//! minute for the life of the process. The table is swapped under a single
//! lock, so readers never observe a half-reset pool.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Requests allowed per key per reset period.
pub const RATE_LIMIT: u32 = 30;

/// Period between quota resets.
pub const RESET_INTERVAL: Duration = Duration::from_secs(60);

/// One API credential and its remaining quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub limit_remaining: u32,
}

/// Process-wide pool of rate-limited API keys.
#[derive(Debug)]
pub struct KeyPool {
    keys: Mutex<Vec<ApiKey>>,
    quota: u32,
    reset_interval: Duration,
}

impl KeyPool {
    /// Create a pool with the standard quota.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_quota(keys, RATE_LIMIT)
    }

    /// Create a pool with a custom per-key quota.
    pub fn with_quota<I, S>(keys: I, quota: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .filter(|key: &String| !key.trim().is_empty())
            .map(|key| ApiKey {
                key,
                limit_remaining: quota,
            })
            .collect();
        Self {
            keys: Mutex::new(keys),
            quota,
            reset_interval: RESET_INTERVAL,
        }
    }

    /// Parse a whitespace-separated key list (the `CMC_API_KEY` format).
    pub fn from_key_list(raw: &str) -> Self {
        Self::new(raw.split_whitespace())
    }

    /// Override the reset period.
    pub fn with_reset_interval(mut self, interval: Duration) -> Self {
        self.reset_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ApiKey>> {
        match self.keys.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Take one request's worth of quota from the first key that has any.
    pub fn acquire(&self) -> Option<String> {
        let mut keys = self.lock();
        match keys.iter_mut().find(|k| k.limit_remaining > 0) {
            Some(api_key) => {
                api_key.limit_remaining -= 1;
                Some(api_key.key.clone())
            }
            None => {
                warn!(
                    keys = keys.len(),
                    "Market data key pool exhausted until next reset"
                );
                None
            }
        }
    }

    /// Restore the full quota on every key at once.
    pub fn reset(&self) {
        let mut keys = self.lock();
        let refreshed: Vec<ApiKey> = keys
            .iter()
            .map(|k| ApiKey {
                key: k.key.clone(),
                limit_remaining: self.quota,
            })
            .collect();
        *keys = refreshed;
        debug!(keys = keys.len(), quota = self.quota, "Market data key quotas reset");
    }

    /// Remaining quota per key, in pool order.
    pub fn remaining(&self) -> Vec<u32> {
        self.lock().iter().map(|k| k.limit_remaining).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset quotas every period until the token is cancelled.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(pool.clone().run_resets(shutdown.clone()));
    /// ```
    pub async fn run_resets(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            interval_secs = self.reset_interval.as_secs(),
            keys = self.len(),
            "Market data key pool reset task starting"
        );

        let mut ticker = interval_at(Instant::now() + self.reset_interval, self.reset_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.reset(),
                _ = shutdown.cancelled() => {
                    info!("Market data key pool reset task shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_first_key_then_rolls_over() {
        let pool = KeyPool::with_quota(["a", "b"], 3);

        for _ in 0..3 {
            assert_eq!(pool.acquire().as_deref(), Some("a"));
        }
        assert_eq!(pool.acquire().as_deref(), Some("b"));
        assert_eq!(pool.remaining(), vec![0, 2]);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let pool = KeyPool::new(["only"]);
        for _ in 0..RATE_LIMIT {
            assert!(pool.acquire().is_some());
        }
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.remaining(), vec![0]);
    }

    #[test]
    fn reset_restores_all_keys() {
        let pool = KeyPool::with_quota(["a", "b"], 2);
        while pool.acquire().is_some() {}
        assert_eq!(pool.remaining(), vec![0, 0]);

        pool.reset();
        assert_eq!(pool.remaining(), vec![2, 2]);
        assert_eq!(pool.acquire().as_deref(), Some("a"));
    }

    #[test]
    fn key_list_is_whitespace_separated() {
        let pool = KeyPool::from_key_list("  k1 k2\tk3 ");
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.acquire().as_deref(), Some("k1"));

        assert!(KeyPool::from_key_list("").is_empty());
        assert_eq!(KeyPool::from_key_list("").acquire(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_resets_every_interval() {
        let pool = Arc::new(KeyPool::with_quota(["a"], 1));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pool.clone().run_resets(shutdown.clone()));

        assert!(pool.acquire().is_some());
        assert!(pool.acquire().is_none());

        // Not yet at the first tick.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(pool.remaining(), vec![0]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pool.remaining(), vec![1]);

        assert!(pool.acquire().is_some());
        tokio::time::sleep(RESET_INTERVAL).await;
        assert_eq!(pool.remaining(), vec![1]);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
