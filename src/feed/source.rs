//! Feed sources.
//!
//! A [`FeedSource`] hands back the complete feed body. Parsing is never
//! started before the body has been read to the end.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::FeedError;

/// Default timeout for a feed request.
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can produce the raw bytes of a feed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the whole feed body.
    async fn fetch_feed(&self) -> Result<Bytes, FeedError>;

    /// Identifier for logging (typically the feed URL).
    fn identifier(&self) -> &str;
}

/// Feed source that issues a single HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: String,
}

impl HttpFeedSource {
    /// Create a source for `url` with the default timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, FeedError> {
        Self::with_timeout(url, DEFAULT_FEED_TIMEOUT)
    }

    /// Create a source for `url` whose requests fail after `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_feed(&self) -> Result<Bytes, FeedError> {
        debug!(url = %self.url, "Requesting feed");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_request_error)?;
        debug!(url = %self.url, bytes = body.len(), "Feed body received");
        Ok(body)
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}

fn map_request_error(err: reqwest::Error) -> FeedError {
    if err.is_timeout() {
        FeedError::Timeout
    } else {
        FeedError::Request(err.to_string())
    }
}
