//! Thumbnail decoder.
//!
//! Fetched bytes are decoded into RGBA pixels once, so cache hits never pay
//! for decoding again.
//!
//! # Design Decisions
//!
//! - **Format sniffing**: the image format is guessed from the bytes, not from
//!   the URL or a Content-Type header.
//! - **Optional downscale**: with a max dimension set, larger images are
//!   shrunk (aspect-preserving) before they enter the cache.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageReader, RgbaImage};

use crate::error::FetchError;

// =============================================================================
// Decoded Image
// =============================================================================

/// A decoded thumbnail. Cloning shares the pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Bytes held by the pixel buffer; this is what the cache budgets.
    pub fn size_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }

    /// Raw RGBA8 pixel data, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Whether both handles share the same pixel buffer.
    pub fn ptr_eq(&self, other: &DecodedImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Decodes fetched image bytes into [`DecodedImage`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailDecoder {
    max_dimension: Option<u32>,
}

impl ThumbnailDecoder {
    /// Decoder that keeps images at their native size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that shrinks images so neither side exceeds `max_dimension`.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: Some(max_dimension.max(1)),
        }
    }

    pub fn max_dimension(&self) -> Option<u32> {
        self.max_dimension
    }

    /// Decode `source` into RGBA pixels.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] if the format is unknown or the data
    /// is corrupt.
    pub fn decode(&self, source: &[u8]) -> Result<DecodedImage, FetchError> {
        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let img = reader
            .decode()
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(DecodedImage::new(self.fit(img).into_rgba8()))
    }

    fn fit(&self, img: DynamicImage) -> DynamicImage {
        match self.max_dimension {
            Some(max) if img.width() > max || img.height() > max => img.thumbnail(max, max),
            _ => img,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
