//! # thumbgrid
//!
//! Loads an image feed and the thumbnails of a scrolling grid.
//!
//! A feed document is fetched and parsed into [`ImageRecord`]s. Each visible
//! grid cell then asks for its thumbnail through a [`ThumbnailRequestBinder`],
//! which routes the request through a bounded [`FetchWorkerPool`] backed by a
//! byte-budgeted [`ThumbnailCache`].
//!
//! ## Features
//!
//! - **Partial-failure feed parsing**: malformed items are skipped with a warning
//! - **Bounded concurrency**: a fixed number of fetch workers and a bounded queue;
//!   overflow is rejected instead of queued forever
//! - **Decoded-image cache**: LRU eviction against a byte budget
//! - **Recycling-safe binding**: a late result never lands in a cell that has
//!   moved on to another URL
//!
//! ## Architecture
//!
//! - [`feed`] - feed sources, parser and record store
//! - [`thumbnail`] - cache, decoder, worker pool and cell binder
//! - [`io`] - image fetchers
//! - [`config`] - CLI and configuration types
//! - [`error`] - error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thumbgrid::{
//!     CellId, DecodedImage, GridConfig, HttpImageFetcher, ThumbnailRequestBinder,
//!     ThumbnailSurface,
//! };
//!
//! struct PrintSurface;
//!
//! impl ThumbnailSurface for PrintSurface {
//!     fn show_placeholder(&self, cell: CellId) {
//!         println!("cell {}: placeholder", cell.0);
//!     }
//!
//!     fn show_image(&self, cell: CellId, image: &DecodedImage) {
//!         println!("cell {}: {}x{}", cell.0, image.width(), image.height());
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = HttpImageFetcher::new().unwrap();
//!     let binder =
//!         ThumbnailRequestBinder::from_config(fetcher, Arc::new(PrintSurface), &GridConfig::default());
//!
//!     binder
//!         .bind_url(CellId(0), "https://cdn.example.com/photo_s.jpg")
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod io;
pub mod thumbnail;

// Re-export commonly used types
pub use config::{Cli, Command, FetchConfig, GridArgs, GridConfig, ParseConfig};
pub use error::{FailureKind, FeedError, FetchError, ParseError};
pub use feed::{
    ingest_feed, FeedRecordParser, FeedSource, HttpFeedSource, ImageRecord, ItemWarning,
    MemoryRecordStore, ProgressSink, RecordStore, SkipReason, TracingProgressSink,
};
pub use io::{HttpImageFetcher, ImageFetcher};
pub use thumbnail::{
    CacheKey, CellId, DecodedImage, FetchRequest, FetchWorkerPool, SlotState, SubmitOutcome,
    ThumbnailCache, ThumbnailDecoder, ThumbnailRequestBinder, ThumbnailSurface,
};
