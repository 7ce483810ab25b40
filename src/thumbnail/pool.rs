//! Bounded worker pool for thumbnail fetches.
//!
//! ```text
//! submit(request, deliver)
//!    │
//!    ├─ cache hit ─────────────────────────────▶ deliver(Ok(image))
//!    │
//!    ├─ worker free ──▶ fetch ─▶ decode ─▶ cache ─▶ deliver(result)
//!    │                                               │
//!    ├─ queue has room ─▶ FIFO queue ◀── drained by ─┘ the same worker
//!    │
//!    └─ queue full ────────────────────────────▶ deliver(Err(Saturated))
//! ```
//!
//! Fetches are never cancelled. A request whose cell has been recycled still
//! runs to completion and fills the cache; discarding its delivery is the
//! binder's job.
//!
//! Each load runs in its own task, so a panicking fetcher surfaces as a
//! `Network` failure. A worker whose delivery callback panics hands its slot
//! and the rest of the queue to a fresh worker.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::GridConfig;
use crate::error::FetchError;
use crate::io::ImageFetcher;

use super::cache::{CacheKey, ThumbnailCache};
use super::decoder::{DecodedImage, ThumbnailDecoder};

/// Result handed to a delivery callback.
pub type Delivery = Result<DecodedImage, FetchError>;

/// Callback invoked exactly once per submitted request.
///
/// Runs on the submitting task for cache hits and rejections, and on a
/// worker task otherwise. Must not panic.
pub type DeliverFn = Box<dyn FnOnce(Delivery) + Send + 'static>;

// =============================================================================
// Fetch Request
// =============================================================================

/// Stable identity of a visible grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

/// A request to load one thumbnail on behalf of one grid slot.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// The slot that asked (not the image)
    pub cell_id: CellId,

    /// Thumbnail to load
    pub key: CacheKey,

    /// When the cell asked; used to log load latency
    pub issued_at: Instant,
}

impl FetchRequest {
    pub fn new(cell_id: CellId, key: CacheKey) -> Self {
        Self {
            cell_id,
            key,
            issued_at: Instant::now(),
        }
    }
}

/// What [`FetchWorkerPool::submit`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Served from cache; already delivered
    CacheHit,
    /// Handed to a free worker
    Dispatched,
    /// Waiting for a worker
    Queued,
    /// Pool saturated; `Saturated` already delivered
    Rejected,
}

// =============================================================================
// Pool State
// =============================================================================

struct PendingFetch {
    request: FetchRequest,
    deliver: DeliverFn,
}

struct WorkerPoolState {
    active_count: usize,
    max_concurrency: usize,
    queue: VecDeque<PendingFetch>,
}

enum Admission {
    Dispatch(PendingFetch),
    Queued,
    Rejected(PendingFetch),
}

struct PoolInner<F> {
    fetcher: F,
    cache: Arc<ThumbnailCache>,
    decoder: ThumbnailDecoder,
    state: Mutex<WorkerPoolState>,
    queue_capacity: usize,
    fetch_timeout: Duration,
}

// =============================================================================
// Fetch Worker Pool
// =============================================================================

/// Pool of at most `max_concurrency` concurrent fetch-and-decode workers
/// with a bounded FIFO queue in front of it.
///
/// Cloning is cheap; clones share workers, queue and cache.
///
/// # Example
///
/// ```ignore
/// use thumbgrid::{GridConfig, HttpImageFetcher};
/// use thumbgrid::thumbnail::{CacheKey, CellId, FetchRequest, FetchWorkerPool};
///
/// let pool = FetchWorkerPool::new(HttpImageFetcher::new()?, &GridConfig::default());
/// let key = CacheKey::parse("https://cdn.example.com/a_s.jpg")?;
///
/// pool.submit(
///     FetchRequest::new(CellId(0), key),
///     Box::new(|result| println!("loaded: {}", result.is_ok())),
/// )
/// .await;
/// ```
pub struct FetchWorkerPool<F> {
    inner: Arc<PoolInner<F>>,
}

impl<F> Clone for FetchWorkerPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ImageFetcher + 'static> FetchWorkerPool<F> {
    /// Create a pool with its own cache, sized from `config`.
    pub fn new(fetcher: F, config: &GridConfig) -> Self {
        let cache = Arc::new(ThumbnailCache::with_budget(config.cache_byte_budget));
        Self::with_cache(fetcher, cache, config)
    }

    /// Create a pool that fills a shared cache.
    pub fn with_cache(fetcher: F, cache: Arc<ThumbnailCache>, config: &GridConfig) -> Self {
        let decoder = match config.thumbnail_max_dimension {
            Some(max) => ThumbnailDecoder::with_max_dimension(max),
            None => ThumbnailDecoder::new(),
        };

        Self {
            inner: Arc::new(PoolInner {
                fetcher,
                cache,
                decoder,
                state: Mutex::new(WorkerPoolState {
                    active_count: 0,
                    max_concurrency: config.max_concurrency.max(1),
                    queue: VecDeque::with_capacity(config.queue_capacity),
                }),
                queue_capacity: config.queue_capacity,
                fetch_timeout: config.fetch_timeout,
            }),
        }
    }

    /// Submit a request. `deliver` is invoked exactly once.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn submit(&self, request: FetchRequest, deliver: DeliverFn) -> SubmitOutcome {
        if let Some(image) = self.inner.cache.get(&request.key).await {
            debug!(cell = request.cell_id.0, key = %request.key, "Thumbnail cache hit");
            deliver(Ok(image));
            return SubmitOutcome::CacheHit;
        }

        let pending = PendingFetch { request, deliver };

        match self.inner.admit(pending) {
            Admission::Dispatch(pending) => {
                debug!(cell = pending.request.cell_id.0, key = %pending.request.key, "Dispatching thumbnail fetch");
                tokio::spawn(run_worker(Arc::clone(&self.inner), pending, false));
                SubmitOutcome::Dispatched
            }
            Admission::Queued => SubmitOutcome::Queued,
            Admission::Rejected(pending) => {
                warn!(cell = pending.request.cell_id.0, key = %pending.request.key, "Worker pool saturated, rejecting thumbnail request");
                (pending.deliver)(Err(FetchError::Saturated));
                SubmitOutcome::Rejected
            }
        }
    }

    /// The cache this pool reads and fills.
    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.inner.cache
    }

    /// Drop all cached thumbnails.
    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
    }

    /// Workers currently running.
    pub fn active_count(&self) -> usize {
        self.inner.lock_state().active_count
    }

    /// Requests waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Upper bound on concurrent workers.
    pub fn max_concurrency(&self) -> usize {
        self.inner.lock_state().max_concurrency
    }

    /// Requests allowed to wait before new ones are rejected.
    pub fn queue_capacity(&self) -> usize {
        self.inner.queue_capacity
    }

    /// Timeout applied to each fetch.
    pub fn fetch_timeout(&self) -> Duration {
        self.inner.fetch_timeout
    }
}

impl<F: ImageFetcher> PoolInner<F> {
    fn lock_state(&self) -> MutexGuard<'_, WorkerPoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, pending: PendingFetch) -> Admission {
        let mut state = self.lock_state();

        if state.active_count < state.max_concurrency {
            state.active_count += 1;
            Admission::Dispatch(pending)
        } else if state.queue.len() < self.queue_capacity {
            debug!(
                cell = pending.request.cell_id.0,
                key = %pending.request.key,
                queued = state.queue.len() + 1,
                "Queueing thumbnail fetch"
            );
            state.queue.push_back(pending);
            Admission::Queued
        } else {
            Admission::Rejected(pending)
        }
    }

    /// Next queued request, or release the caller's worker slot.
    fn next_or_release(&self) -> Option<PendingFetch> {
        let mut state = self.lock_state();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.active_count -= 1;
        }
        next
    }

    /// Give up a worker slot without taking more work.
    fn release(&self) {
        let mut state = self.lock_state();
        state.active_count = state.active_count.saturating_sub(1);
    }

    async fn load(&self, key: &CacheKey) -> Delivery {
        let bytes = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(key.as_str()))
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        let decoder = self.decoder;
        let image = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))??;

        self.cache.put(key.clone(), image.clone()).await;
        Ok(image)
    }
}

/// A held worker slot.
///
/// Dropped while still held (the worker unwound), it passes the slot and the
/// next queued request to a new worker so the queue keeps draining.
struct WorkerSlot<F: ImageFetcher + 'static> {
    inner: Arc<PoolInner<F>>,
    held: bool,
}

impl<F: ImageFetcher + 'static> Drop for WorkerSlot<F> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }

        warn!("Thumbnail worker exited abnormally, handing off its slot");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                if let Some(next) = self.inner.next_or_release() {
                    handle.spawn(run_worker(Arc::clone(&self.inner), next, true));
                }
            }
            Err(_) => self.inner.release(),
        }
    }
}

async fn run_worker<F: ImageFetcher + 'static>(
    inner: Arc<PoolInner<F>>,
    first: PendingFetch,
    from_queue: bool,
) {
    let mut slot = WorkerSlot { inner, held: true };
    let mut job = first;
    let mut from_queue = from_queue;

    loop {
        let PendingFetch { request, deliver } = job;

        // An earlier fetch may have filled the cache while this one waited.
        let cached = if from_queue {
            slot.inner.cache.get(&request.key).await
        } else {
            None
        };

        let result = match cached {
            Some(image) => Ok(image),
            None => load_isolated(&slot.inner, &request.key).await,
        };

        match &result {
            Ok(_) => debug!(
                cell = request.cell_id.0,
                key = %request.key,
                elapsed_ms = request.issued_at.elapsed().as_millis() as u64,
                "Thumbnail loaded"
            ),
            Err(e) => warn!(cell = request.cell_id.0, key = %request.key, error = %e, "Thumbnail load failed"),
        }
        deliver(result);

        match slot.inner.next_or_release() {
            Some(next) => {
                job = next;
                from_queue = true;
            }
            None => {
                slot.held = false;
                break;
            }
        }
    }
}

/// Run one load in its own task so a panicking fetcher fails only this request.
async fn load_isolated<F: ImageFetcher + 'static>(
    inner: &Arc<PoolInner<F>>,
    key: &CacheKey,
) -> Delivery {
    let task_inner = Arc::clone(inner);
    let task_key = key.clone();

    match tokio::spawn(async move { task_inner.load(&task_key).await }).await {
        Ok(result) => result,
        Err(e) => Err(FetchError::Network(format!("fetch task failed: {}", e))),
    }
}

// =============================================================================
// Tests
// =============================================================================
