//! Thumbnail fetch-and-cache subsystem.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Grid cells (bind / detach)       │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        ThumbnailRequestBinder           │
//! │  (live-slot table, stale discard)       │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           FetchWorkerPool               │
//! │  ┌────────────────┐  ┌───────────────┐  │
//! │  │ ThumbnailCache │  │ Thumbnail     │  │
//! │  │ (decoded, LRU, │  │ Decoder       │  │
//! │  │  byte budget)  │  │               │  │
//! │  └────────────────┘  └───────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             ImageFetcher                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ThumbnailRequestBinder`]: per-cell binding; applies a result only if
//!   the cell still expects it
//! - [`FetchWorkerPool`]: bounded concurrent fetch + decode with a bounded
//!   FIFO queue and saturation rejection
//! - [`ThumbnailCache`]: byte-budgeted LRU of decoded images keyed by [`CacheKey`]
//! - [`ThumbnailDecoder`]: bytes to [`DecodedImage`], optional downscale
//!
//! # Locking
//!
//! The cache, the pool state and the slot table each have their own lock.
//! No code path holds two of them at once.

mod binder;
mod cache;
mod decoder;
mod pool;

pub use binder::{SlotState, ThumbnailRequestBinder, ThumbnailSurface};
pub use cache::{CacheEntryInfo, CacheKey, ThumbnailCache, DEFAULT_CACHE_BYTE_BUDGET};
pub use decoder::{DecodedImage, ThumbnailDecoder};
pub use pool::{
    CellId, DeliverFn, Delivery, FetchRequest, FetchWorkerPool, SubmitOutcome,
};
