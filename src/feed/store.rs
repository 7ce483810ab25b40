//! Record storage and feed ingest.
//!
//! The grid reads records back from a [`RecordStore`] in a stable order.
//! [`MemoryRecordStore`] keeps them in feed order.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::FeedError;

use super::parser::{FeedRecordParser, ImageRecord, ProgressSink};
use super::source::FeedSource;

/// Persistent home for parsed records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Replace all stored records with `records`, keeping their order.
    async fn replace_all(&self, records: Vec<ImageRecord>);

    /// Number of stored records.
    async fn len(&self) -> usize;

    /// Record at `position`, if any.
    async fn get(&self, position: usize) -> Option<ImageRecord>;

    /// Snapshot of every record in order.
    async fn records(&self) -> Vec<ImageRecord>;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Full-size image URL for the record at `position`.
    ///
    /// Used when a grid cell is clicked.
    async fn full_image_url(&self, position: usize) -> Option<String> {
        self.get(position)
            .await
            .map(|record| record.full_image_url().to_string())
    }
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<ImageRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn replace_all(&self, records: Vec<ImageRecord>) {
        *self.records.write().await = records;
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    async fn get(&self, position: usize) -> Option<ImageRecord> {
        self.records.read().await.get(position).cloned()
    }

    async fn records(&self) -> Vec<ImageRecord> {
        self.records.read().await.clone()
    }
}

/// Fetch a feed, parse it and replace the store contents.
///
/// Returns the number of stored records. On any error the store is left
/// as it was.
pub async fn ingest_feed<F, S>(
    source: &F,
    store: &S,
    sink: &dyn ProgressSink,
) -> Result<usize, FeedError>
where
    F: FeedSource + ?Sized,
    S: RecordStore + ?Sized,
{
    let body = source.fetch_feed().await?;
    let records = FeedRecordParser::new().parse(&body, sink)?;
    let count = records.len();

    store.replace_all(records).await;
    info!(
        feed = source.identifier(),
        records = count,
        "Feed ingested"
    );

    Ok(count)
}
