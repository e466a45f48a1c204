//! Core types for page rendering and caching

use std::fmt;
use std::sync::Arc;

/// 1-indexed page number within a document session
pub type PageNumber = usize;

/// Fully decoded, screen-ready bitmap for one page.
///
/// Pixel data is RGB, 3 bytes per pixel, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Raw RGB pixel data
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width_px: u32,
    /// Image height in pixels
    pub height_px: u32,
}

impl RasterImage {
    #[must_use]
    pub fn new(pixels: Vec<u8>, width_px: u32, height_px: u32) -> Self {
        Self {
            pixels,
            width_px,
            height_px,
        }
    }

    /// Size of the pixel buffer in bytes
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Session-wide render target. Any change starts a new epoch.
#[derive(Clone, Copy, Debug)]
pub struct RenderParams {
    /// Target width in pixels (from the container width)
    pub width_px: u32,
    /// Render scale factor
    pub scale: f32,
}

impl RenderParams {
    #[must_use]
    pub fn new(width_px: u32, scale: f32) -> Self {
        Self { width_px, scale }
    }

    /// Scale stored as millionths for stable comparison
    #[must_use]
    pub fn scale_millionths(&self) -> u32 {
        (self.scale * 1_000_000.0) as u32
    }
}

impl PartialEq for RenderParams {
    fn eq(&self, other: &Self) -> bool {
        self.width_px == other.width_px && self.scale_millionths() == other.scale_millionths()
    }
}

impl Eq for RenderParams {}

/// Generation counter distinguishing cache contents of different
/// document/viewport configurations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling class of a render
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Speculative neighbor prefetch
    Background,
    /// A page someone is waiting on
    Foreground,
}

/// A completed render. Immutable once created.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub page: PageNumber,
    pub raster: Arc<RasterImage>,
    pub rendered_at: RenderParams,
    pub epoch: Epoch,
}

/// Counters exposed for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub epoch: Epoch,
    pub cached_pages: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub renders_started: u64,
    pub renders_committed: u64,
    pub renders_failed: u64,
    pub renders_discarded: u64,
}
