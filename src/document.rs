//! Collaborator contracts: document acquisition and the page render primitive

use std::fmt;
use std::sync::Arc;

use crate::error::{RenderFault, SessionError};
use crate::types::{PageNumber, RasterImage};

/// Decode/rasterize primitive bound to one loaded document.
///
/// Calls are made from worker threads and may run concurrently for
/// different pages. A render cannot be interrupted once started.
pub trait PageRenderer: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> usize;

    /// Rasterize `page` (1-indexed) at the given target width and scale
    fn render_page(
        &self,
        page: PageNumber,
        width_px: u32,
        scale: f32,
    ) -> Result<RasterImage, RenderFault>;
}

/// Opaque identifier of a viewable document
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves identifiers into fetchable locations and opens them
pub trait DocumentProvider {
    /// Resolve an identifier into a fetchable URL
    fn resolve(&self, id: &DocumentId) -> Result<String, SessionError>;

    /// Load the document at `url` into a render handle
    fn open(&self, url: &str) -> Result<Arc<dyn PageRenderer>, SessionError>;
}
