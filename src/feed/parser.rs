//! Feed document parser.
//!
//! Turns a complete feed response body into an ordered list of
//! [`ImageRecord`]s. The expected document shape is:
//!
//! ```text
//! {
//!   "data": [
//!     { "images": {
//!         "standard_resolution": { "url": "https://..." },
//!         "low_resolution":      { "url": "https://..." }
//!     } },
//!     ...
//!   ]
//! }
//! ```
//!
//! Items missing either URL are skipped and reported as [`ItemWarning`]s.
//! Only a document that cannot be interpreted at all fails the parse.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::error::ParseError;

const STANDARD_URL_POINTER: &str = "/images/standard_resolution/url";
const THUMBNAIL_URL_POINTER: &str = "/images/low_resolution/url";

// =============================================================================
// Image Record
// =============================================================================

/// One image listed in the feed.
///
/// Records are freshly built for every feed item and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    thumbnail_url: String,
    full_image_url: String,
    thumbnail_filename: String,
    full_image_filename: String,
}

impl ImageRecord {
    /// Build a record, deriving both filenames from the URLs.
    ///
    /// `index` is the item position in the feed and only used to name
    /// placeholders for URLs without a final path segment.
    pub fn new(index: usize, thumbnail_url: String, full_image_url: String) -> Self {
        let thumbnail_filename = filename_for(&thumbnail_url, index, "thumb");
        let full_image_filename = filename_for(&full_image_url, index, "full");
        Self {
            thumbnail_url,
            full_image_url,
            thumbnail_filename,
            full_image_filename,
        }
    }

    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }

    pub fn full_image_url(&self) -> &str {
        &self.full_image_url
    }

    pub fn thumbnail_filename(&self) -> &str {
        &self.thumbnail_filename
    }

    pub fn full_image_filename(&self) -> &str {
        &self.full_image_filename
    }
}

/// Final path segment of `url`, or a generated `image-<index>-<suffix>` name.
fn filename_for(url: &str, index: usize, suffix: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| format!("image-{}-{}", index, suffix))
}

// =============================================================================
// Warnings and Progress
// =============================================================================

/// Why a feed item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingStandardResolution,
    MissingLowResolution,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "item is not an object"),
            SkipReason::MissingStandardResolution => {
                write!(f, "missing standard_resolution url")
            }
            SkipReason::MissingLowResolution => write!(f, "missing low_resolution url"),
        }
    }
}

/// A non-fatal problem with a single feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemWarning {
    /// 0-based position of the item in the `data` array
    pub index: usize,
    pub reason: SkipReason,
}

impl fmt::Display for ItemWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped feed item {}: {}", self.index, self.reason)
    }
}

/// Observer for parse progress. Purely a side channel; the parse result
/// does not depend on it.
pub trait ProgressSink: Send + Sync {
    /// Called once per produced record. `count` is 1-based.
    fn progress(&self, count: usize, message: &str);

    /// Called once per skipped item.
    fn warning(&self, warning: &ItemWarning) {
        let _ = warning;
    }
}

/// Progress sink that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn progress(&self, _count: usize, message: &str) {
        info!("{}", message);
    }

    fn warning(&self, warning: &ItemWarning) {
        warn!("{}", warning);
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Parser for image feed documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedRecordParser;

impl FeedRecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a complete feed body into records, in feed order.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Truncated`] if the input ends mid-structure
    /// - [`ParseError::MalformedDocument`] if the input is not JSON or has no
    ///   top-level `data` array
    pub fn parse(
        &self,
        raw: &[u8],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<ImageRecord>, ParseError> {
        let document: Value = serde_json::from_slice(raw)?;

        let items = document
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ParseError::MalformedDocument("expected an object with a `data` array".to_string())
            })?;

        let mut records = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            match extract_record(index, item) {
                Ok(record) => {
                    let count = records.len() + 1;
                    sink.progress(
                        count,
                        &format!("Parsed Image[{}]:{}", count, record.full_image_url()),
                    );
                    records.push(record);
                }
                Err(reason) => sink.warning(&ItemWarning { index, reason }),
            }
        }

        Ok(records)
    }
}

fn extract_record(index: usize, item: &Value) -> Result<ImageRecord, SkipReason> {
    if !item.is_object() {
        return Err(SkipReason::NotAnObject);
    }

    let full = url_at(item, STANDARD_URL_POINTER).ok_or(SkipReason::MissingStandardResolution)?;
    let thumb = url_at(item, THUMBNAIL_URL_POINTER).ok_or(SkipReason::MissingLowResolution)?;

    Ok(ImageRecord::new(index, thumb.to_string(), full.to_string()))
}

fn url_at<'a>(item: &'a Value, pointer: &str) -> Option<&'a str> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
