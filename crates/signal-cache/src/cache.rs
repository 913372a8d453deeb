//! Async single-flight cache — `spec.md` §4.6.
//!
//! One `DashMap` shard per key, a `Shared` future standing in for the
//! `IN_FLIGHT` cell state, and an epoch counter per in-flight claim so a
//! racing `put`/`invalidate` can poison a load's eventual write-back
//! without holding any lock across an `.await`. This is the same shape
//! `toka_store_memory` uses for its `Arc<RwLock<HashMap<...>>>` backend,
//! generalized from a plain map to a map of suspend/resume cells.
//!
//! `invalidate` on an `IN_FLIGHT` cell keeps the same future and epoch
//! (so it's still recognized as the same generation by every awaiter
//! that already joined it) but flips a `poisoned` flag in place. When
//! that generation's loader call resolves, `settle` sees the matching
//! epoch *and* the poisoned flag and removes the cell outright instead
//! of leaving a stale, already-resolved `IN_FLIGHT` entry behind with
//! nobody left to reap it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use signal_cache_types::{CacheKey, Headers};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::loader::Loader;
use crate::metrics::CacheMetrics;
use signal_cache_types::CachedProjection;

type LoadFuture = Shared<BoxFuture<'static, Result<CachedProjection, CacheError>>>;

enum CellState {
    InFlight { future: LoadFuture, epoch: u64, poisoned: bool },
    Ready { projection: CachedProjection, installed_at: Instant, last_access: AtomicU64 },
}

/// Node-local, read-through, single-flight-per-key cache.
pub struct SignalCache {
    cells: DashMap<CacheKey, CellState>,
    loader: Arc<dyn Loader>,
    config: CacheConfig,
    metrics: CacheMetrics,
    epochs: AtomicU64,
    created_at: Instant,
}

impl SignalCache {
    /// Build a cache backed by `loader`, tuned by `config`.
    pub fn new(loader: Arc<dyn Loader>, config: CacheConfig) -> Self {
        Self {
            cells: DashMap::new(),
            loader,
            config,
            metrics: CacheMetrics::new(),
            epochs: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Snapshot the cache's diagnostics counters.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Number of cells currently tracked (`READY` or `IN_FLIGHT`).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` if no cells are tracked.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn claim_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed)
    }

    /// Fetch the cached projection for `key`, loading it if absent.
    /// At most one loader invocation is ever in flight per key.
    pub async fn get(&self, key: &CacheKey) -> Result<CachedProjection, CacheError> {
        self.get_with_headers(key, None).await
    }

    /// Like [`Self::get`], but a fresh loader call uses `headers_override`
    /// instead of `key.headers` (used by the decision engine to forward a
    /// triggering event's headers on a forced reload). Has no effect when
    /// the key already has a `READY` value or an `IN_FLIGHT` load to join.
    pub async fn get_with_headers(
        &self,
        key: &CacheKey,
        headers_override: Option<&Headers>,
    ) -> Result<CachedProjection, CacheError> {
        let (future, epoch) = match self.cells.entry(key.clone()) {
            Entry::Occupied(occupied) => match occupied.get() {
                CellState::Ready { projection, last_access, .. } => {
                    last_access.store(self.millis_since_start(), Ordering::Relaxed);
                    self.metrics.record_hit();
                    return Ok(projection.clone());
                }
                CellState::InFlight { future, epoch, .. } => (future.clone(), *epoch),
            },
            Entry::Vacant(vacant) => {
                self.metrics.record_miss();
                self.metrics.record_loader_invocation();
                let epoch = self.claim_epoch();
                let future = self.dispatch(key.clone(), headers_override.cloned());
                vacant.insert(CellState::InFlight { future: future.clone(), epoch, poisoned: false });
                (future, epoch)
            }
        };

        let result = future.await;
        self.settle(key, epoch, &result);
        result
    }

    fn dispatch(&self, key: CacheKey, headers_override: Option<Headers>) -> LoadFuture {
        let loader = Arc::clone(&self.loader);
        async move {
            let headers = headers_override.as_ref().unwrap_or(&key.headers);
            loader
                .load(&key.entity_id, key.selector.as_ref(), headers)
                .await
                .map(CachedProjection::from)
        }
        .boxed()
        .shared()
    }

    fn settle(&self, key: &CacheKey, epoch: u64, result: &Result<CachedProjection, CacheError>) {
        match result {
            Ok(projection) => {
                if let Entry::Occupied(mut occupied) = self.cells.entry(key.clone()) {
                    match occupied.get() {
                        CellState::InFlight { epoch: e, poisoned, .. } if *e == epoch && *poisoned => {
                            occupied.remove();
                            debug!("poisoned in-flight load resolved; discarding without storing");
                        }
                        CellState::InFlight { epoch: e, .. } if *e == epoch => {
                            occupied.insert(CellState::Ready {
                                projection: projection.clone(),
                                installed_at: Instant::now(),
                                last_access: AtomicU64::new(self.millis_since_start()),
                            });
                        }
                        _ => {
                            debug!("load for key superseded by a racing put/invalidate; discarding");
                        }
                    }
                }
                self.evict_if_over_capacity();
            }
            Err(error) => {
                if let Entry::Occupied(occupied) = self.cells.entry(key.clone()) {
                    let still_ours =
                        matches!(occupied.get(), CellState::InFlight { epoch: e, .. } if *e == epoch);
                    if still_ours {
                        occupied.remove();
                    }
                }
                warn!(%error, "loader failed; key left absent for retry");
                self.metrics.record_loader_failure();
            }
        }
    }

    /// Atomically install `projection` as the `READY` value for `key`.
    /// Does not cancel any in-flight load; the load's eventual result is
    /// discarded instead of overwriting this value (see [`Self::settle`]).
    pub fn put(&self, key: &CacheKey, projection: CachedProjection) {
        self.cells.insert(
            key.clone(),
            CellState::Ready {
                projection,
                installed_at: Instant::now(),
                last_access: AtomicU64::new(self.millis_since_start()),
            },
        );
        self.evict_if_over_capacity();
    }

    /// Remove any `READY` entry for `key`. An `IN_FLIGHT` entry is left
    /// running (so its awaiters aren't orphaned) but is poisoned so its
    /// completion is not stored.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Entry::Occupied(mut occupied) = self.cells.entry(key.clone()) {
            match occupied.get() {
                CellState::Ready { .. } => {
                    occupied.remove();
                    self.metrics.record_invalidation();
                }
                CellState::InFlight { future, epoch, .. } => {
                    let future = future.clone();
                    let epoch = *epoch;
                    occupied.insert(CellState::InFlight { future, epoch, poisoned: true });
                    self.metrics.record_invalidation();
                }
            }
        }
    }

    /// Remove expired `READY` entries. Never touches `IN_FLIGHT` cells.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut expired = Vec::new();
        for entry in self.cells.iter() {
            if let CellState::Ready { installed_at, last_access, .. } = entry.value() {
                let last_access_millis = last_access.load(Ordering::Relaxed);
                if self.is_expired(now, *installed_at, last_access_millis) {
                    expired.push(entry.key().clone());
                }
            }
        }
        for key in expired {
            if let Entry::Occupied(occupied) = self.cells.entry(key) {
                if matches!(occupied.get(), CellState::Ready { .. }) {
                    occupied.remove();
                    self.metrics.record_eviction();
                }
            }
        }
    }

    fn is_expired(&self, now: Instant, installed_at: Instant, last_access_millis: u64) -> bool {
        if now.saturating_duration_since(installed_at) >= self.config.expire_after_write() {
            return true;
        }
        if let Some(idle_limit) = self.config.expire_after_access() {
            let idle = Duration::from_millis(self.millis_since_start().saturating_sub(last_access_millis));
            if idle >= idle_limit {
                return true;
            }
        }
        false
    }

    fn evict_if_over_capacity(&self) {
        let cap = self.config.maximum_size().get();
        if self.cells.len() <= cap {
            return;
        }
        let mut ready_entries: Vec<(CacheKey, Instant)> = self
            .cells
            .iter()
            .filter_map(|entry| match entry.value() {
                CellState::Ready { installed_at, .. } => Some((entry.key().clone(), *installed_at)),
                CellState::InFlight { .. } => None,
            })
            .collect();
        ready_entries.sort_by_key(|(_, installed_at)| *installed_at);

        let overflow = self.cells.len().saturating_sub(cap);
        for (key, _) in ready_entries.into_iter().take(overflow) {
            if let Entry::Occupied(occupied) = self.cells.entry(key) {
                if matches!(occupied.get(), CellState::Ready { .. }) {
                    occupied.remove();
                    self.metrics.record_eviction();
                }
            }
        }
    }

    fn millis_since_start(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }
}
