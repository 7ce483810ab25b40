//! Thumbnail cache for decoded images.
//!
//! This module provides an LRU cache for decoded thumbnails, so a cell that
//! scrolls back into view never triggers a second download.
//!
//! # Cache Key
//!
//! Thumbnails are keyed by their normalized URL (see [`CacheKey`]). Two
//! records with the same thumbnail URL always share one entry.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the decoded size of every entry and evicts
//! least-recently-used entries until a new entry fits the byte budget. An
//! entry larger than the whole budget is never cached. All bookkeeping lives
//! behind a single lock, so the budget holds after every operation even with
//! many workers inserting concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

use super::decoder::DecodedImage;

/// Default cache budget: 32MB of decoded pixels
pub const DEFAULT_CACHE_BYTE_BUDGET: usize = 32 * 1024 * 1024;

// =============================================================================
// Cache Key
// =============================================================================

/// Normalized thumbnail URL.
///
/// Normalization lowercases scheme and host, drops default ports and the
/// fragment, so trivially different spellings of one URL share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Parse and normalize `url`.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let mut parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        parsed.set_fragment(None);
        Ok(Self(Arc::from(parsed.as_str())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    image: DecodedImage,
    size_bytes: usize,
    last_access: Instant,
}

/// Metadata about a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub size_bytes: usize,
    pub last_access: Instant,
}

struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    current_size: usize,
}

// =============================================================================
// Thumbnail Cache
// =============================================================================

/// LRU cache for decoded thumbnails with a byte budget.
///
/// # Thread Safety
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
///
/// # Example
///
/// ```
/// use thumbgrid::thumbnail::{CacheKey, DecodedImage, ThumbnailCache};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = ThumbnailCache::with_budget(1024 * 1024);
///     let key = CacheKey::parse("https://cdn.example.com/a_s.jpg").unwrap();
///     let image = DecodedImage::new(image::RgbaImage::new(4, 4));
///
///     cache.put(key.clone(), image.clone()).await;
///     assert_eq!(cache.get(&key).await, Some(image));
/// }
/// ```
pub struct ThumbnailCache {
    state: Mutex<CacheState>,
    budget: usize,
}

impl ThumbnailCache {
    /// Create a cache with the default budget (32MB).
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_CACHE_BYTE_BUDGET)
    }

    /// Create a cache holding at most `budget` bytes of decoded pixels.
    pub fn with_budget(budget: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                current_size: 0,
            }),
            budget,
        }
    }

    /// Look up a thumbnail, marking it as recently used.
    pub async fn get(&self, key: &CacheKey) -> Option<DecodedImage> {
        let mut state = self.state.lock().await;
        let entry = state.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.image.clone())
    }

    /// Check for a thumbnail without touching its LRU position.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().await.entries.contains(key)
    }

    /// Size and last access of an entry, without touching its LRU position.
    pub async fn entry_info(&self, key: &CacheKey) -> Option<CacheEntryInfo> {
        let state = self.state.lock().await;
        state.entries.peek(key).map(|entry| CacheEntryInfo {
            size_bytes: entry.size_bytes,
            last_access: entry.last_access,
        })
    }

    /// Store a thumbnail.
    ///
    /// Replaces any existing entry for `key`. Least-recently-used entries
    /// are evicted until the new one fits. Returns `false` (and changes
    /// nothing) when the image alone exceeds the budget.
    pub async fn put(&self, key: CacheKey, image: DecodedImage) -> bool {
        let size_bytes = image.size_bytes();
        if size_bytes > self.budget {
            debug!(key = %key, size_bytes, budget = self.budget, "Thumbnail exceeds cache budget, not cached");
            return false;
        }

        let mut state = self.state.lock().await;

        if let Some(old) = state.entries.pop(&key) {
            state.current_size -= old.size_bytes;
        }

        while state.current_size + size_bytes > self.budget {
            match state.entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    state.current_size -= evicted.size_bytes;
                    debug!(key = %evicted_key, size_bytes = evicted.size_bytes, "Evicted thumbnail");
                }
                None => break,
            }
        }

        state.entries.put(
            key,
            CacheEntry {
                image,
                size_bytes,
                last_access: Instant::now(),
            },
        );
        state.current_size += size_bytes;
        true
    }

    /// Remove a thumbnail, returning it if it was cached.
    pub async fn remove(&self, key: &CacheKey) -> Option<DecodedImage> {
        let mut state = self.state.lock().await;
        let entry = state.entries.pop(key)?;
        state.current_size -= entry.size_bytes;
        Some(entry.image)
    }

    /// Drop every entry. Used on memory pressure.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.current_size = 0;
    }

    /// Number of cached thumbnails.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Total decoded bytes currently cached.
    pub async fn size(&self) -> usize {
        self.state.lock().await.current_size
    }

    /// Byte budget.
    pub fn capacity(&self) -> usize {
        self.budget
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
