//! Configuration management for thumbgrid.
//!
//! This module provides:
//! - [`GridConfig`]: the library-level options for the thumbnail pipeline
//! - [`Cli`]/[`Command`]: command-line arguments via clap, with environment
//!   variable fallbacks using the `THUMBGRID_` prefix
//!
//! # Environment Variables
//!
//! - `THUMBGRID_MAX_CONCURRENCY` - Concurrent thumbnail fetches (default: 4)
//! - `THUMBGRID_QUEUE_CAPACITY` - Pending fetches before rejecting (default: 16)
//! - `THUMBGRID_CACHE_BYTES` - Decoded thumbnail cache budget (default: 32MB)
//! - `THUMBGRID_FETCH_TIMEOUT_SECS` - Per-thumbnail fetch timeout (default: 10, max: 3600)
//! - `THUMBGRID_THUMBNAIL_MAX_DIMENSION` - Downscale thumbnails to fit (default: off)
//! - `THUMBGRID_FEED_URL` - Feed to fetch for the `fetch` command

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::thumbnail::DEFAULT_CACHE_BYTE_BUDGET;

// =============================================================================
// Default Values
// =============================================================================

/// Default number of concurrent fetch workers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default number of requests allowed to wait for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default per-thumbnail fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Longest accepted per-thumbnail fetch timeout in seconds.
pub const MAX_FETCH_TIMEOUT_SECS: u64 = 3600;

/// Default number of grid cells bound by the `fetch` command.
pub const DEFAULT_VISIBLE_CELLS: usize = 12;

// =============================================================================
// Library Configuration
// =============================================================================

/// Options for the thumbnail pool, cache and decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridConfig {
    /// Maximum concurrent fetch-and-decode workers
    pub max_concurrency: usize,

    /// Maximum requests waiting for a worker; 0 rejects whenever all
    /// workers are busy
    pub queue_capacity: usize,

    /// Byte budget of the decoded thumbnail cache
    pub cache_byte_budget: usize,

    /// Timeout for a single thumbnail fetch
    pub fetch_timeout: Duration,

    /// Shrink decoded thumbnails so neither side exceeds this
    pub thumbnail_max_dimension: Option<u32>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cache_byte_budget: DEFAULT_CACHE_BYTE_BUDGET,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            thumbnail_max_dimension: None,
        }
    }
}

impl GridConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".to_string());
        }
        if self.cache_byte_budget == 0 {
            return Err("cache_byte_budget must be greater than 0".to_string());
        }
        if self.fetch_timeout.is_zero() {
            return Err("fetch_timeout must be greater than 0".to_string());
        }
        if self.fetch_timeout > Duration::from_secs(MAX_FETCH_TIMEOUT_SECS) {
            return Err(format!(
                "fetch_timeout must be at most {} seconds",
                MAX_FETCH_TIMEOUT_SECS
            ));
        }
        if self.thumbnail_max_dimension == Some(0) {
            return Err("thumbnail_max_dimension must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// thumbgrid - Load an image feed and its thumbnails.
#[derive(Parser, Debug, Clone)]
#[command(name = "thumbgrid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Parse a feed document from disk and print its records as JSON.
    Parse(ParseConfig),

    /// Fetch a feed, then load thumbnails for the first grid cells.
    Fetch(FetchConfig),
}

/// Options for `thumbgrid parse`.
#[derive(Args, Debug, Clone)]
pub struct ParseConfig {
    /// Path to a feed document.
    pub path: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Options for `thumbgrid fetch`.
#[derive(Args, Debug, Clone)]
pub struct FetchConfig {
    /// URL of the feed document.
    #[arg(env = "THUMBGRID_FEED_URL")]
    pub feed_url: String,

    /// Number of grid cells to bind.
    #[arg(long, default_value_t = DEFAULT_VISIBLE_CELLS)]
    pub cells: usize,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Thumbnail pipeline options shared by commands.
#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    /// Maximum concurrent thumbnail fetches.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY, env = "THUMBGRID_MAX_CONCURRENCY")]
    pub max_concurrency: usize,

    /// Pending fetches allowed before new requests are rejected.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "THUMBGRID_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Decoded thumbnail cache budget in bytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_BYTE_BUDGET, env = "THUMBGRID_CACHE_BYTES")]
    pub cache_bytes: usize,

    /// Per-thumbnail fetch timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "THUMBGRID_FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: u64,

    /// Downscale thumbnails so neither side exceeds this many pixels.
    #[arg(long, env = "THUMBGRID_THUMBNAIL_MAX_DIMENSION")]
    pub thumbnail_max_dimension: Option<u32>,
}

impl GridArgs {
    pub fn to_grid_config(&self) -> GridConfig {
        GridConfig {
            max_concurrency: self.max_concurrency,
            queue_capacity: self.queue_capacity,
            cache_byte_budget: self.cache_bytes,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            thumbnail_max_dimension: self.thumbnail_max_dimension,
        }
    }
}

impl FetchConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.feed_url.is_empty() {
            return Err("Feed URL is required. Pass it or set THUMBGRID_FEED_URL".to_string());
        }
        if url::Url::parse(&self.feed_url).is_err() {
            return Err(format!("Feed URL is not a valid URL: {}", self.feed_url));
        }
        self.grid.to_grid_config().validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
