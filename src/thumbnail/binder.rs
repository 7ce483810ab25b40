//! Binding grid cells to thumbnail loads.
//!
//! Grid cells are recycled while the user scrolls, so a fetch started for a
//! cell may complete after that cell already shows a different URL. The
//! binder keeps a live-slot table mapping each cell to the key it currently
//! expects. A delivery is applied only if the table still expects that key;
//! every other delivery is dropped.
//!
//! Per-slot state machine:
//!
//! ```text
//!            bind(k)              deliver(k, Ok)
//! Unbound ───────────▶ Pending(k) ──────────────▶ Shown(k)
//!    ▲                  │   ▲  │  deliver(k, Err)
//!    │      detach      │   │  └───────────────▶ Failed(k)
//!    └──────────────────┘   │
//!                           └── bind(k') from any bound state
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::GridConfig;
use crate::error::FetchError;
use crate::io::ImageFetcher;

use super::cache::CacheKey;
use super::decoder::DecodedImage;
use super::pool::{CellId, DeliverFn, Delivery, FetchRequest, FetchWorkerPool, SubmitOutcome};

/// The view side of the grid.
///
/// Methods are called while the binder holds its slot table lock, so an
/// implementation must not call back into the binder.
pub trait ThumbnailSurface: Send + Sync + 'static {
    /// Show the "not loaded" image in `cell`.
    fn show_placeholder(&self, cell: CellId);

    /// Show a loaded thumbnail in `cell`.
    fn show_image(&self, cell: CellId, image: &DecodedImage);

    /// The load for `cell` failed. The placeholder stays by default.
    fn show_failure(&self, cell: CellId, error: &FetchError) {
        let _ = error;
        self.show_placeholder(cell);
    }
}

/// What a bound slot is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// Placeholder shown, waiting for `key`
    Pending(CacheKey),
    /// `key` is on screen
    Shown(CacheKey),
    /// Loading `key` failed; placeholder stays until the next bind
    Failed(CacheKey),
}

impl SlotState {
    pub fn key(&self) -> &CacheKey {
        match self {
            SlotState::Pending(key) | SlotState::Shown(key) | SlotState::Failed(key) => key,
        }
    }
}

type SlotTable = Arc<Mutex<HashMap<CellId, SlotState>>>;

fn lock_slots(slots: &Mutex<HashMap<CellId, SlotState>>) -> MutexGuard<'_, HashMap<CellId, SlotState>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Glue between grid cells and the [`FetchWorkerPool`].
pub struct ThumbnailRequestBinder<F, S> {
    pool: FetchWorkerPool<F>,
    surface: Arc<S>,
    slots: SlotTable,
}

impl<F, S> Clone for ThumbnailRequestBinder<F, S> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            surface: Arc::clone(&self.surface),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<F, S> ThumbnailRequestBinder<F, S>
where
    F: ImageFetcher + 'static,
    S: ThumbnailSurface,
{
    pub fn new(pool: FetchWorkerPool<F>, surface: Arc<S>) -> Self {
        Self {
            pool,
            surface,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build a binder with its own pool and cache.
    pub fn from_config(fetcher: F, surface: Arc<S>, config: &GridConfig) -> Self {
        Self::new(FetchWorkerPool::new(fetcher, config), surface)
    }

    /// Show `key` in `cell`.
    ///
    /// Shows the placeholder, records `key` as the only thumbnail `cell` may
    /// display from now on, and submits the load. Any earlier load for this
    /// cell becomes stale.
    pub async fn bind(&self, cell: CellId, key: CacheKey) -> SubmitOutcome {
        {
            let mut slots = lock_slots(&self.slots);
            slots.insert(cell, SlotState::Pending(key.clone()));
            self.surface.show_placeholder(cell);
        }

        let deliver = self.deliverer(cell, key.clone());
        self.pool.submit(FetchRequest::new(cell, key), deliver).await
    }

    /// Like [`bind`](Self::bind), but from a raw URL.
    ///
    /// An unparsable URL leaves the placeholder in place and the cell unbound.
    pub async fn bind_url(&self, cell: CellId, url: &str) -> Result<SubmitOutcome, FetchError> {
        match CacheKey::parse(url) {
            Ok(key) => Ok(self.bind(cell, key).await),
            Err(err) => {
                warn!(cell = cell.0, url, error = %err, "Not loading thumbnail");
                let mut slots = lock_slots(&self.slots);
                slots.remove(&cell);
                self.surface.show_placeholder(cell);
                Err(err)
            }
        }
    }

    /// `cell` left the visible set. Results still in flight for it are dropped.
    pub fn detach(&self, cell: CellId) {
        if lock_slots(&self.slots).remove(&cell).is_some() {
            debug!(cell = cell.0, "Cell detached");
        }
    }

    /// Detach every cell (the whole grid is going away).
    pub fn detach_all(&self) {
        lock_slots(&self.slots).clear();
    }

    /// Current state of `cell`, `None` when unbound.
    pub fn slot_state(&self, cell: CellId) -> Option<SlotState> {
        lock_slots(&self.slots).get(&cell).cloned()
    }

    /// Number of bound cells.
    pub fn bound_count(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    /// Drop all cached thumbnails. Cells keep what they show.
    pub async fn on_memory_pressure(&self) {
        self.pool.clear_cache().await;
    }

    pub fn pool(&self) -> &FetchWorkerPool<F> {
        &self.pool
    }

    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    fn deliverer(&self, cell: CellId, key: CacheKey) -> DeliverFn {
        let slots = Arc::clone(&self.slots);
        let surface = Arc::clone(&self.surface);
        Box::new(move |result| apply_delivery(&slots, surface.as_ref(), cell, &key, result))
    }
}

/// Apply `result` to `cell` if the cell is still waiting for `key`.
fn apply_delivery<S: ThumbnailSurface>(
    slots: &Mutex<HashMap<CellId, SlotState>>,
    surface: &S,
    cell: CellId,
    key: &CacheKey,
    result: Delivery,
) {
    let mut slots = lock_slots(slots);

    let expected = matches!(slots.get(&cell), Some(SlotState::Pending(pending)) if pending == key);
    if !expected {
        debug!(
            cell = cell.0,
            key = %key,
            current = ?slots.get(&cell).map(|s| s.key().as_str()),
            "Discarding stale thumbnail result"
        );
        return;
    }

    let next = match result {
        Ok(image) => {
            surface.show_image(cell, &image);
            SlotState::Shown(key.clone())
        }
        Err(err) => {
            surface.show_failure(cell, &err);
            SlotState::Failed(key.clone())
        }
    };
    slots.insert(cell, next);
}
