//! Document session - owns the document handle and its render cache
//!
//! A session resolves a document identifier, opens the document and
//! creates a [`CacheController`] tied to its lifetime. Viewport and
//! document changes flow through [`ViewState`] commands; each resulting
//! effect is executed against the controller.

use std::sync::Arc;

use log::{debug, info};

use crate::config::CacheConfig;
use crate::controller::CacheController;
use crate::document::{DocumentId, DocumentProvider, PageRenderer};
use crate::error::SessionError;
use crate::request::Settlement;
use crate::state::{Command, Effect, ViewState};
use crate::types::{PageNumber, RasterImage};

/// Result of showing a page
#[derive(Clone, Debug)]
pub struct PageView {
    pub page: PageNumber,
    /// `None` when the render failed; the viewer should offer a retry
    pub raster: Option<Arc<RasterImage>>,
    /// Whether the page was already cached
    pub cache_hit: bool,
}

impl PageView {
    #[must_use]
    pub fn is_displayed(&self) -> bool {
        self.raster.is_some()
    }
}

pub struct DocumentSession<P: DocumentProvider> {
    provider: P,
    id: DocumentId,
    url: String,
    state: ViewState,
    prefetch_radius: usize,
    controller: CacheController,
}

impl<P: DocumentProvider> DocumentSession<P> {
    /// Resolve and open `id`. Acquisition errors are fatal to the session.
    pub fn open(provider: P, id: DocumentId, config: &CacheConfig) -> Result<Self, SessionError> {
        let (url, document) = Self::acquire(&provider, &id)?;
        let state = ViewState::new(config.initial_params(), document.page_count());
        let controller = CacheController::new(document, state.render_params(), config);
        info!("Opened {id} ({url}), {} pages", state.page_count);

        Ok(Self {
            provider,
            id,
            url,
            state,
            prefetch_radius: config.prefetch_radius,
            controller,
        })
    }

    fn acquire(
        provider: &P,
        id: &DocumentId,
    ) -> Result<(String, Arc<dyn PageRenderer>), SessionError> {
        let url = provider.resolve(id)?;
        let document = provider.open(&url)?;
        if document.page_count() == 0 {
            return Err(SessionError::Empty { url });
        }
        Ok((url, document))
    }

    /// Apply a command; returns the page view when the current page was shown
    pub fn apply_command(&mut self, cmd: Command) -> Result<Option<PageView>, SessionError> {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects)
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) -> Result<Option<PageView>, SessionError> {
        let mut view = None;
        for effect in effects {
            match effect {
                Effect::InvalidateCache => {
                    if !self.controller.set_render_params(self.state.render_params()) {
                        self.controller.clear();
                    }
                }

                Effect::ReloadDocument => {
                    let (url, document) = Self::acquire(&self.provider, &self.id)?;
                    let effects = self.state.apply(Command::SetPageCount(document.page_count()));
                    debug_assert!(effects.is_empty());
                    self.controller.set_document(document);
                    info!("Reloaded {} ({url})", self.id);
                    self.url = url;
                }

                Effect::RenderCurrentPage => {
                    view = Some(self.show_page(self.state.current_page));
                }
            }
        }
        Ok(view)
    }

    /// Display a page: cache hit shows at once, a miss waits for exactly
    /// one render. Neighbors are prefetched either way.
    pub fn show_page(&mut self, page: PageNumber) -> PageView {
        let _ = self.state.apply(Command::GoToPage(page));
        let page = self.state.current_page;

        let (raster, cache_hit) = match self.controller.get(page) {
            Some(raster) => (Some(raster), true),
            None => {
                let settlement = self.controller.preload(page).wait();
                if settlement != Settlement::Ready {
                    debug!("Page {page} settled as {settlement:?}");
                }
                (self.controller.get(page), false)
            }
        };

        if raster.is_some() {
            self.controller.mark_displayed(page);
        }
        self.controller.preload_neighbors(page, self.prefetch_radius);

        PageView {
            page,
            raster,
            cache_hit,
        }
    }

    /// Feed a container width measurement
    pub fn set_viewport_width(&mut self, width_px: u32) -> Option<PageView> {
        // only Reload can fail
        self.apply_command(Command::SetWidth(width_px)).ok().flatten()
    }

    pub fn next_page(&mut self) -> Option<PageView> {
        self.apply_command(Command::NextPage).ok().flatten()
    }

    pub fn prev_page(&mut self) -> Option<PageView> {
        self.apply_command(Command::PrevPage).ok().flatten()
    }

    /// Re-acquire the document and start over with an empty cache
    pub fn reload(&mut self) -> Result<Option<PageView>, SessionError> {
        self.apply_command(Command::Reload)
    }

    pub fn clear(&mut self) {
        let _ = self.apply_command(Command::Clear);
    }

    #[must_use]
    pub fn controller(&self) -> &CacheController {
        &self.controller
    }

    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedRenderer;
    use crate::types::Epoch;

    struct FixedProvider {
        renderer: Arc<ScriptedRenderer>,
    }

    impl DocumentProvider for FixedProvider {
        fn resolve(&self, id: &DocumentId) -> Result<String, SessionError> {
            Ok(format!("memory://{id}"))
        }

        fn open(&self, _url: &str) -> Result<Arc<dyn PageRenderer>, SessionError> {
            Ok(self.renderer.clone())
        }
    }

    fn config() -> CacheConfig {
        CacheConfig {
            workers: 2,
            prefetch_radius: 0,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn empty_document_is_rejected() {
        let provider = FixedProvider {
            renderer: Arc::new(ScriptedRenderer::new(0)),
        };
        let err = DocumentSession::open(provider, DocumentId::new("x"), &config())
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Empty { .. }));
    }

    #[test]
    fn show_page_misses_then_hits() {
        let renderer = Arc::new(ScriptedRenderer::new(10));
        let provider = FixedProvider {
            renderer: renderer.clone(),
        };
        let mut session = DocumentSession::open(provider, DocumentId::new("x"), &config()).unwrap();
        assert_eq!(session.url(), "memory://x");

        let first = session.show_page(4);
        assert!(!first.cache_hit);
        assert!(first.is_displayed());

        let again = session.show_page(4);
        assert!(again.cache_hit);
        assert_eq!(renderer.calls(4), 1);
    }

    #[test]
    fn failed_page_does_not_block_navigation() {
        let renderer = Arc::new(ScriptedRenderer::new(10));
        renderer.fail(2);
        let provider = FixedProvider {
            renderer: renderer.clone(),
        };
        let mut session = DocumentSession::open(provider, DocumentId::new("x"), &config()).unwrap();

        let view = session.show_page(2);
        assert!(!view.is_displayed());

        let view = session.next_page().unwrap();
        assert_eq!(view.page, 3);
        assert!(view.is_displayed());
    }

    #[test]
    fn clear_command_empties_cache() {
        let renderer = Arc::new(ScriptedRenderer::new(10));
        let provider = FixedProvider {
            renderer: renderer.clone(),
        };
        let mut session = DocumentSession::open(provider, DocumentId::new("x"), &config()).unwrap();
        session.show_page(1);
        let epoch = session.controller().epoch();

        session.clear();
        assert!(session.controller().get(1).is_none());
        assert_eq!(session.controller().epoch(), epoch.next());
    }

    #[test]
    fn controller_renders_at_clamped_scale() {
        let renderer = Arc::new(ScriptedRenderer::new(10));
        let provider = FixedProvider {
            renderer: renderer.clone(),
        };
        let config = CacheConfig {
            scale: 0.05,
            initial_width: 1000,
            ..config()
        };
        let mut session = DocumentSession::open(provider, DocumentId::new("x"), &config).unwrap();

        assert_eq!(session.controller().render_params(), session.state().render_params());
        let view = session.show_page(1);
        assert_eq!(view.raster.unwrap().width_px, 100);

        // already at the floor, so nothing to redo
        assert!(session.apply_command(Command::SetScale(0.1)).unwrap().is_none());
        assert_eq!(session.controller().epoch(), Epoch::default());
    }
}
