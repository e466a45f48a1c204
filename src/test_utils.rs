//! Test helpers: a scriptable page renderer

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::document::PageRenderer;
use crate::error::RenderFault;
use crate::types::{PageNumber, RasterImage};

#[derive(Default)]
struct Script {
    calls: HashMap<PageNumber, usize>,
    order: Vec<PageNumber>,
    widths: Vec<(PageNumber, u32)>,
    started: HashSet<PageNumber>,
    held: HashSet<PageNumber>,
    failing: HashSet<PageNumber>,
    panicking: HashSet<PageNumber>,
}

/// Renderer that records every call and can hold, fail or panic on pages.
///
/// Rasters are `width * scale` pixels wide, one pixel high, and every byte
/// carries the page number so tests can tell pages apart.
pub struct ScriptedRenderer {
    page_count: usize,
    script: Mutex<Script>,
    changed: Condvar,
}

impl ScriptedRenderer {
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            script: Mutex::new(Script::default()),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Page number encoded in a raster produced by this renderer
    #[must_use]
    pub fn page_of(raster: &RasterImage) -> PageNumber {
        raster.pixels.first().copied().map_or(0, usize::from)
    }

    /// Block renders of `page` until `release`
    pub fn hold(&self, page: PageNumber) {
        self.lock().held.insert(page);
    }

    pub fn release(&self, page: PageNumber) {
        self.lock().held.remove(&page);
        self.changed.notify_all();
    }

    pub fn fail(&self, page: PageNumber) {
        self.lock().failing.insert(page);
    }

    pub fn heal(&self, page: PageNumber) {
        self.lock().failing.remove(&page);
    }

    pub fn panic_on(&self, page: PageNumber) {
        self.lock().panicking.insert(page);
    }

    /// Wait until a render of `page` has started
    pub fn wait_started(&self, page: PageNumber, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut script = self.lock();
        while !script.started.contains(&page) {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            script = self
                .changed
                .wait_timeout(script, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Wait until `n` renders have been started in total
    pub fn wait_total(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut script = self.lock();
        while script.order.len() < n {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            script = self
                .changed
                .wait_timeout(script, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    #[must_use]
    pub fn calls(&self, page: PageNumber) -> usize {
        self.lock().calls.get(&page).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock().order.len()
    }

    /// Pages in the order renders started
    #[must_use]
    pub fn order(&self) -> Vec<PageNumber> {
        self.lock().order.clone()
    }

    /// (page, width) of every render call
    #[must_use]
    pub fn widths(&self) -> Vec<(PageNumber, u32)> {
        self.lock().widths.clone()
    }
}

impl PageRenderer for ScriptedRenderer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(
        &self,
        page: PageNumber,
        width_px: u32,
        scale: f32,
    ) -> Result<RasterImage, RenderFault> {
        let mut script = self.lock();
        *script.calls.entry(page).or_default() += 1;
        script.order.push(page);
        script.widths.push((page, width_px));
        script.started.insert(page);
        self.changed.notify_all();

        while script.held.contains(&page) {
            script = self
                .changed
                .wait(script)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let panics = script.panicking.contains(&page);
        let fails = script.failing.contains(&page);
        drop(script);

        if panics {
            panic!("scripted panic on page {page}");
        }
        if fails {
            return Err(RenderFault::Decode {
                page,
                detail: "scripted failure".to_string(),
            });
        }

        let width = ((width_px as f32) * scale).round().max(1.0) as u32;
        Ok(RasterImage::new(vec![page as u8; width as usize * 3], width, 1))
    }
}
