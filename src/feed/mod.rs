//! Feed-to-record pipeline.
//!
//! ```text
//! ┌──────────────┐   bytes   ┌──────────────────┐  records  ┌─────────────┐
//! │  FeedSource  │ ────────▶ │ FeedRecordParser │ ────────▶ │ RecordStore │
//! └──────────────┘           └────────┬─────────┘           └─────────────┘
//!                                     │ progress / warnings
//!                                     ▼
//!                              ┌──────────────┐
//!                              │ ProgressSink │
//!                              └──────────────┘
//! ```
//!
//! - [`FeedSource`]: returns the whole feed body ([`HttpFeedSource`] over HTTP)
//! - [`FeedRecordParser`]: builds [`ImageRecord`]s, skipping malformed items
//! - [`RecordStore`]: keeps records in a stable order for the grid
//! - [`ingest_feed`]: runs the three steps in sequence

mod parser;
mod source;
mod store;

pub use parser::{
    FeedRecordParser, ImageRecord, ItemWarning, ProgressSink, SkipReason, TracingProgressSink,
};
pub use source::{FeedSource, HttpFeedSource, DEFAULT_FEED_TIMEOUT};
pub use store::{ingest_feed, MemoryRecordStore, RecordStore};
