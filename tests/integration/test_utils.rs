//! Test utilities for integration tests.
//!
//! This module provides a scriptable image fetcher, a recording grid surface
//! and helpers for building feed documents and PNG fixtures.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use thumbgrid::{CacheKey, CellId, DecodedImage, FetchError, GridConfig, ImageFetcher, ThumbnailSurface};

// =============================================================================
// Fixtures
// =============================================================================

/// A PNG whose width identifies it (height is always 1).
pub fn png_bytes(width: u32) -> Bytes {
    let img = RgbaImage::from_pixel(width, 1, Rgba([width as u8, 0, 0, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    Bytes::from(out)
}

/// Thumbnail URL used across tests.
pub fn thumb_url(name: &str) -> String {
    format!("https://cdn.test/thumbs/{}.png", name)
}

pub fn key(name: &str) -> CacheKey {
    CacheKey::parse(&thumb_url(name)).unwrap()
}

/// Build a feed document. `None` leaves the URL out of the item.
pub fn feed_document(items: &[(Option<&str>, Option<&str>)]) -> Vec<u8> {
    let data: Vec<serde_json::Value> = items
        .iter()
        .map(|(full, thumb)| {
            let mut images = serde_json::Map::new();
            if let Some(url) = full {
                images.insert("standard_resolution".into(), serde_json::json!({ "url": url }));
            }
            if let Some(url) = thumb {
                images.insert("low_resolution".into(), serde_json::json!({ "url": url }));
            }
            serde_json::json!({ "id": "x", "images": images })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({ "data": data, "meta": { "code": 200 } })).unwrap()
}

pub fn grid_config(max_concurrency: usize, queue_capacity: usize) -> GridConfig {
    GridConfig {
        max_concurrency,
        queue_capacity,
        fetch_timeout: Duration::from_secs(5),
        ..GridConfig::default()
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =============================================================================
// Mock Image Fetcher
// =============================================================================

#[derive(Clone)]
enum MockResponse {
    Body(Bytes),
    Error(FetchError),
}

/// Image fetcher with scripted responses and optional per-URL gates.
///
/// A gated URL blocks inside `fetch` until a permit is added to its gate.
/// URLs with no scripted response answer with HTTP 404.
#[derive(Default)]
pub struct MockImageFetcher {
    responses: Mutex<HashMap<String, MockResponse>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
}

impl MockImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `png_bytes(width)` for the thumbnail named `name`.
    pub fn with_image(self, name: &str, width: u32) -> Self {
        self.set_body(name, png_bytes(width));
        self
    }

    pub fn with_error(self, name: &str, error: FetchError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(thumb_url(name), MockResponse::Error(error));
        self
    }

    pub fn set_body(&self, name: &str, body: Bytes) {
        self.responses
            .lock()
            .unwrap()
            .insert(thumb_url(name), MockResponse::Body(body));
    }

    /// Hold fetches of `name` until permits are added to the returned gate.
    pub fn gate(&self, name: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(thumb_url(name), Arc::clone(&gate));
        gate
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        let url = thumb_url(name);
        self.calls.lock().unwrap().iter().filter(|c| **c == url).count()
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(MockResponse::Body(body)) => Ok(body),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(FetchError::HttpStatus(404)),
        }
    }
}

// =============================================================================
// Recording Surface
// =============================================================================

/// What a cell currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Displayed {
    Placeholder,
    /// Identified by image width (see [`png_bytes`])
    Image(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Placeholder(CellId),
    Image(CellId, u32),
    Failure(CellId, FetchError),
}

/// Grid surface that records every call.
#[derive(Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, cell: CellId) -> Vec<SurfaceEvent> {
        self.events()
            .into_iter()
            .filter(|event| match event {
                SurfaceEvent::Placeholder(c) | SurfaceEvent::Image(c, _) | SurfaceEvent::Failure(c, _) => {
                    *c == cell
                }
            })
            .collect()
    }

    /// What `cell` shows after all recorded calls, `None` if never touched.
    pub fn displayed(&self, cell: CellId) -> Option<Displayed> {
        self.events_for(cell).last().map(|event| match event {
            SurfaceEvent::Image(_, width) => Displayed::Image(*width),
            SurfaceEvent::Placeholder(_) | SurfaceEvent::Failure(_, _) => Displayed::Placeholder,
        })
    }

    /// Widths of every image ever shown in `cell`.
    pub fn images_shown(&self, cell: CellId) -> Vec<u32> {
        self.events_for(cell)
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::Image(_, width) => Some(width),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self, cell: CellId) -> Vec<FetchError> {
        self.events_for(cell)
            .into_iter()
            .filter_map(|event| match event {
                SurfaceEvent::Failure(_, err) => Some(err),
                _ => None,
            })
            .collect()
    }
}

impl ThumbnailSurface for RecordingSurface {
    fn show_placeholder(&self, cell: CellId) {
        self.events.lock().unwrap().push(SurfaceEvent::Placeholder(cell));
    }

    fn show_image(&self, cell: CellId, image: &DecodedImage) {
        self.events
            .lock()
            .unwrap()
            .push(SurfaceEvent::Image(cell, image.width()));
    }

    fn show_failure(&self, cell: CellId, error: &FetchError) {
        self.events
            .lock()
            .unwrap()
            .push(SurfaceEvent::Failure(cell, error.clone()));
    }
}
