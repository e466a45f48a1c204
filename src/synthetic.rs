//! Synthetic documents for the demo binary
//!
//! Pages are procedurally generated gradients; rendering sleeps for a
//! configurable latency to stand in for a real decode.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::document::{DocumentId, DocumentProvider, PageRenderer};
use crate::error::{RenderFault, SessionError};
use crate::types::{PageNumber, RasterImage};

/// A4 portrait aspect ratio
const PAGE_ASPECT: f32 = 297.0 / 210.0;
const URL_SCHEME: &str = "synthetic://";

pub struct SyntheticDocument {
    pages: usize,
    latency: Duration,
    broken: Vec<PageNumber>,
}

impl SyntheticDocument {
    #[must_use]
    pub fn new(pages: usize, latency: Duration) -> Self {
        Self {
            pages,
            latency,
            broken: Vec::new(),
        }
    }

    /// Pages that always fail to decode
    #[must_use]
    pub fn with_broken_pages(mut self, broken: Vec<PageNumber>) -> Self {
        self.broken = broken;
        self
    }
}

impl PageRenderer for SyntheticDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render_page(
        &self,
        page: PageNumber,
        width_px: u32,
        scale: f32,
    ) -> Result<RasterImage, RenderFault> {
        if page == 0 || page > self.pages {
            return Err(RenderFault::PageOutOfRange {
                page,
                page_count: self.pages,
            });
        }
        thread::sleep(self.latency);
        if self.broken.contains(&page) {
            return Err(RenderFault::Decode {
                page,
                detail: "corrupt content stream".to_string(),
            });
        }

        let width = ((width_px as f32) * scale).round().max(1.0) as u32;
        let height = ((width as f32) * PAGE_ASPECT).round() as u32;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            let shade = (y * 255 / height.max(1)) as u8;
            for _ in 0..width {
                pixels.extend_from_slice(&[page as u8, shade, 255 - shade]);
            }
        }
        Ok(RasterImage::new(pixels, width, height))
    }
}

/// Resolves `synthetic:<pages>` identifiers
pub struct SyntheticProvider {
    pub latency: Duration,
    pub broken: Vec<PageNumber>,
}

impl DocumentProvider for SyntheticProvider {
    fn resolve(&self, id: &DocumentId) -> Result<String, SessionError> {
        let pages = id
            .0
            .strip_prefix("synthetic:")
            .ok_or_else(|| SessionError::Resolve {
                id: id.to_string(),
                detail: "expected synthetic:<pages>".to_string(),
            })?;
        Ok(format!("{URL_SCHEME}{pages}"))
    }

    fn open(&self, url: &str) -> Result<Arc<dyn PageRenderer>, SessionError> {
        let pages = url
            .strip_prefix(URL_SCHEME)
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(|| SessionError::Open {
                url: url.to_string(),
                detail: "not a synthetic document".to_string(),
            })?;
        Ok(Arc::new(
            SyntheticDocument::new(pages, self.latency).with_broken_pages(self.broken.clone()),
        ))
    }
}
