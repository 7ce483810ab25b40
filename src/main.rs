//! thumbgrid - Load an image feed and its thumbnails.
//!
//! `parse` prints the records of a local feed document. `fetch` downloads a
//! feed, stores its records and loads thumbnails for the first grid cells.

use clap::Parser;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumbgrid::{
    config::{Cli, Command, FetchConfig, ParseConfig},
    feed::DEFAULT_FEED_TIMEOUT,
    ingest_feed, CellId, DecodedImage, FeedRecordParser, FetchError, HttpFeedSource,
    HttpImageFetcher, MemoryRecordStore, RecordStore, ThumbnailRequestBinder, ThumbnailSurface,
    TracingProgressSink,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse(config) => run_parse(config).await,
        Command::Fetch(config) => run_fetch(config).await,
    }
}

// =============================================================================
// Parse Command
// =============================================================================

async fn run_parse(config: ParseConfig) -> ExitCode {
    init_logging(config.verbose);

    let body = match tokio::fs::read(&config.path).await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to read {}: {}", config.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let records = match FeedRecordParser::new().parse(&body, &TracingProgressSink) {
        Ok(records) => records,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&records) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize records: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Fetch Command
// =============================================================================

/// Outcome of one cell, as reported by the surface.
#[derive(Debug)]
enum CellEvent {
    Shown { cell: CellId, width: u32, height: u32 },
    Failed { cell: CellId, error: FetchError },
}

/// Surface that forwards final cell states to the command loop.
struct ChannelSurface {
    tx: mpsc::UnboundedSender<CellEvent>,
}

impl ThumbnailSurface for ChannelSurface {
    fn show_placeholder(&self, cell: CellId) {
        debug!(cell = cell.0, "Placeholder");
    }

    fn show_image(&self, cell: CellId, image: &DecodedImage) {
        let _ = self.tx.send(CellEvent::Shown {
            cell,
            width: image.width(),
            height: image.height(),
        });
    }

    fn show_failure(&self, cell: CellId, error: &FetchError) {
        let _ = self.tx.send(CellEvent::Failed {
            cell,
            error: error.clone(),
        });
    }
}

async fn run_fetch(config: FetchConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    let grid = config.grid.to_grid_config();

    info!("Configuration:");
    info!("  Feed: {}", config.feed_url);
    info!(
        "  Workers: {}, queue: {}, cache: {}KB, timeout: {:?}",
        grid.max_concurrency,
        grid.queue_capacity,
        grid.cache_byte_budget / 1024,
        grid.fetch_timeout
    );

    let source = match HttpFeedSource::with_timeout(&config.feed_url, DEFAULT_FEED_TIMEOUT) {
        Ok(source) => source,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let store = MemoryRecordStore::new();

    let count = match ingest_feed(&source, &store, &TracingProgressSink).await {
        Ok(count) => count,
        Err(e) => {
            error!("Feed ingest failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if count == 0 {
        warn!("Feed contained no usable images");
        return ExitCode::SUCCESS;
    }

    let fetcher = match HttpImageFetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let binder = ThumbnailRequestBinder::from_config(fetcher, Arc::new(ChannelSurface { tx }), &grid);

    let visible = config.cells.min(count);
    let mut results: BTreeMap<usize, String> = BTreeMap::new();
    let mut waiting = 0;

    for position in 0..visible {
        let Some(record) = store.get(position).await else {
            break;
        };
        match binder.bind_url(CellId(position), record.thumbnail_url()).await {
            Ok(_) => waiting += 1,
            Err(e) => {
                results.insert(position, invalid_url_status(&e));
            }
        }
    }

    // Every bound cell reports exactly once; allow one timeout per wave of workers.
    let waves = u32::try_from(visible / grid.max_concurrency + 1).unwrap_or(u32::MAX);
    let deadline = grid
        .fetch_timeout
        .saturating_mul(waves)
        .saturating_add(Duration::from_secs(5));

    let collected = tokio::time::timeout(deadline, async {
        while waiting > 0 {
            let Some(event) = rx.recv().await else { break };
            waiting -= 1;
            let (cell, status) = cell_status(&event);
            results.insert(cell.0, status);
        }
    })
    .await;

    if collected.is_err() {
        warn!("Timed out waiting for thumbnails");
    }

    for position in 0..visible {
        let filename = match store.get(position).await {
            Some(record) => record.thumbnail_filename().to_string(),
            None => continue,
        };
        let status = results
            .get(&position)
            .map(String::as_str)
            .unwrap_or("pending");
        println!("[{:>3}] {:<40} {}", position, filename, status);
    }

    let (size, capacity) = (binder.pool().cache().size().await, binder.pool().cache().capacity());
    info!("Cache: {} / {} bytes", size, capacity);

    binder.detach_all();
    ExitCode::SUCCESS
}

/// Status column for a cell whose URL could not be bound. The table row
/// already shows the filename.
fn invalid_url_status(error: &FetchError) -> String {
    format!("invalid URL ({})", error)
}

fn cell_status(event: &CellEvent) -> (CellId, String) {
    match event {
        CellEvent::Shown { cell, width, height } => (*cell, format!("{}x{}", width, height)),
        CellEvent::Failed { cell, error } => (*cell, format!("placeholder ({})", error)),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "thumbgrid=debug"
    } else {
        "thumbgrid=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
