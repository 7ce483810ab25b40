use std::time::Duration;

use thiserror::Error;

/// Fatal errors that abort parsing of a whole feed document.
///
/// Individual malformed items never produce a `ParseError`; they are skipped
/// and reported through the progress sink instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document is not the expected shape (invalid JSON, or no `data` array)
    #[error("Malformed feed document: {0}")]
    MalformedDocument(String),

    /// The byte stream ended in the middle of a JSON structure
    #[error("Feed document truncated: {0}")]
    Truncated(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Eof => ParseError::Truncated(err.to_string()),
            _ => ParseError::MalformedDocument(err.to_string()),
        }
    }
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Network,
    Decode,
    Saturated,
    Timeout,
}

/// Errors delivered for a single thumbnail load.
///
/// These are always recovered locally: the requesting cell keeps its
/// placeholder. Nothing in this crate propagates them further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The fetched bytes are not a decodable image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// All workers busy and the pending queue is full
    #[error("Worker pool saturated")]
    Saturated,

    /// The fetch did not complete within the configured timeout
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Classify this error into one of the four failure kinds.
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) | FetchError::HttpStatus(_) | FetchError::InvalidUrl(_) => {
                FailureKind::Network
            }
            FetchError::Decode(_) => FailureKind::Decode,
            FetchError::Saturated => FailureKind::Saturated,
            FetchError::Timeout(_) => FailureKind::Timeout,
        }
    }
}

/// Errors from fetching and ingesting a feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The request could not be sent or the body could not be read
    #[error("Feed request failed: {0}")]
    Request(String),

    /// The feed endpoint answered with a non-success status
    #[error("Feed endpoint returned HTTP status {0}")]
    HttpStatus(u16),

    /// The feed request exceeded its timeout
    #[error("Feed request timed out")]
    Timeout,

    /// The feed body could not be parsed
    #[error("Feed parse error: {0}")]
    Parse(#[from] ParseError),
}
