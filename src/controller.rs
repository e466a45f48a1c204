//! Cache controller - single-flight rendering, prefetch and invalidation

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flume::Sender;
use log::{debug, info, warn};

use crate::config::CacheConfig;
use crate::document::PageRenderer;
use crate::error::RenderFault;
use crate::registry::TaskRegistry;
use crate::request::{Preload, RenderJob, Settlement, WorkerSignal};
use crate::scheduler::{RenderQueue, spawn_workers};
use crate::store::RasterStore;
use crate::types::{CacheEntry, CacheStats, Epoch, PageNumber, Priority, RasterImage, RenderParams};

/// Everything a clear and a settlement must see consistently
pub(crate) struct CacheState {
    epoch: Epoch,
    params: RenderParams,
    document: Arc<dyn PageRenderer>,
    page_count: usize,
    store: RasterStore,
    registry: TaskRegistry,
    queue: RenderQueue,
    displayed: Option<PageNumber>,
    /// Last page a foreground waiter was told is ready. Pinned until the
    /// next `mark_displayed`.
    handed_off: Option<PageNumber>,
    stats: CacheStats,
}

impl CacheState {
    fn in_range(&self, page: PageNumber) -> bool {
        (1..=self.page_count).contains(&page)
    }

    fn invalidate(&mut self) -> Epoch {
        self.epoch = self.epoch.next();
        self.store.invalidate_all();
        let tasks = self.registry.drain();
        let queued = self.queue.clear();
        self.displayed = None;
        self.handed_off = None;
        info!(
            "Cache epoch {}: dropped {tasks} task(s), {queued} queued job(s)",
            self.epoch
        );
        self.epoch
    }

    fn job(&self, id: crate::request::TaskId, page: PageNumber) -> RenderJob {
        RenderJob {
            id,
            page,
            epoch: self.epoch,
            params: self.params,
            renderer: Arc::clone(&self.document),
        }
    }

    /// Queue a render unless the page is cached or already in flight
    fn schedule(&mut self, page: PageNumber, priority: Priority) -> bool {
        if self.store.contains(page) || self.registry.contains(page) {
            return false;
        }
        let id = self.registry.begin(page, self.epoch, priority, None);
        let job = self.job(id, page);
        self.queue.push(job, priority);
        self.stats.renders_started += 1;
        true
    }
}

/// State shared between the controller and its workers
pub(crate) struct Shared {
    state: Mutex<CacheState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next job a worker should render, skipping jobs from older epochs
    pub(crate) fn next_job(&self) -> Option<RenderJob> {
        let mut state = self.lock();
        while let Some(job) = state.queue.pop() {
            if job.epoch == state.epoch && state.registry.claim(job.page, job.id) {
                return Some(job);
            }
        }
        None
    }

    /// Commit or discard a finished render and wake its waiters
    pub(crate) fn settle(&self, job: RenderJob, result: Result<RasterImage, RenderFault>) {
        let (settlement, waiters) = {
            let mut guard = self.lock();
            let state = &mut *guard;

            let Some(task) = state.registry.finish(job.page, job.id, state.epoch) else {
                state.stats.renders_discarded += 1;
                debug!(
                    "Discarding stale render of page {} from epoch {} (now {})",
                    job.page, job.epoch, state.epoch
                );
                return;
            };

            match result {
                Ok(raster) => {
                    let entry = CacheEntry {
                        page: job.page,
                        raster: Arc::new(raster),
                        rendered_at: job.params,
                        epoch: job.epoch,
                    };
                    if task.priority == Priority::Foreground && task.waiter_count() > 0 {
                        state.handed_off = Some(job.page);
                    }
                    let pinned = [state.displayed, state.handed_off];
                    let evicted = state.store.insert(entry, |p| pinned.contains(&Some(p)));
                    if !evicted.is_empty() {
                        debug!("Evicted pages {evicted:?}");
                    }
                    state.stats.renders_committed += 1;
                    debug!("Cached page {} ({:?})", job.page, task.priority);
                    (Settlement::Ready, task.into_waiters())
                }
                Err(e) => {
                    state.stats.renders_failed += 1;
                    warn!("Render of page {} failed: {e}", job.page);
                    (Settlement::Failed, task.into_waiters())
                }
            }
        };

        for waiter in waiters {
            let _ = waiter.send(settlement);
        }
    }
}

/// Page render cache for one document session.
///
/// Owns a pool of render workers. Dropping the controller clears the cache
/// and stops the workers once their current render returns.
pub struct CacheController {
    shared: Arc<Shared>,
    signals: Sender<WorkerSignal>,
    workers: usize,
}

impl CacheController {
    #[must_use]
    pub fn new(document: Arc<dyn PageRenderer>, params: RenderParams, config: &CacheConfig) -> Self {
        let config = config.clone().normalized();
        let page_count = document.page_count();
        let state = CacheState {
            epoch: Epoch::default(),
            params,
            document,
            page_count,
            store: RasterStore::new(config.capacity()),
            registry: TaskRegistry::new(),
            queue: RenderQueue::new(),
            displayed: None,
            handed_off: None,
            stats: CacheStats::default(),
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
        });

        // flume receivers are cloneable, so every worker pulls from one queue
        let (signals, signal_rx) = flume::unbounded();
        let workers = spawn_workers(config.workers, &shared, &signal_rx);
        info!(
            "Cache controller started: {page_count} pages, {workers} worker(s), {}px @ {}",
            params.width_px,
            params.scale
        );

        Self {
            shared,
            signals,
            workers,
        }
    }

    /// Cached raster for `page`, if it belongs to the current epoch
    #[must_use]
    pub fn get(&self, page: PageNumber) -> Option<Arc<RasterImage>> {
        let state = self.shared.lock();
        state
            .store
            .get(page)
            .filter(|e| e.epoch == state.epoch && e.rendered_at == state.params)
            .map(|e| Arc::clone(&e.raster))
    }

    /// Make sure `page` is cached or being rendered at foreground priority
    pub fn preload(&self, page: PageNumber) -> Preload {
        let started = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;

            if !state.in_range(page) {
                debug!("Ignoring preload of page {page} (document has {})", state.page_count);
                return Preload::settled(page, Settlement::Failed);
            }
            if state.store.contains(page) {
                state.stats.hits += 1;
                return Preload::settled(page, Settlement::Ready);
            }
            state.stats.misses += 1;

            let (tx, rx) = flume::bounded(1);
            if state.registry.attach(page, tx.clone()) {
                if let Some(id) = state.registry.promote(page) {
                    state.queue.promote(id);
                    debug!("Promoted prefetch of page {page} to foreground");
                }
                return Preload::pending(page, rx);
            }

            state.schedule(page, Priority::Foreground);
            state.registry.attach(page, tx);
            Preload::pending(page, rx)
        };
        self.wake(1);
        started
    }

    /// Fire background renders for the pages around `center`, nearest first.
    ///
    /// Returns the number of renders newly queued.
    pub fn preload_neighbors(&self, center: PageNumber, radius: usize) -> usize {
        let queued = {
            let mut state = self.shared.lock();
            // nothing lies further than page_count away from an in-range page
            let radius = radius.min(state.page_count);
            let mut queued = 0;
            for offset in 1..=radius {
                let forward = center.checked_add(offset);
                let backward = center.checked_sub(offset);
                for page in [forward, backward].into_iter().flatten() {
                    if state.in_range(page) && state.schedule(page, Priority::Background) {
                        queued += 1;
                    }
                }
            }
            queued
        };
        if queued > 0 {
            debug!("Prefetching {queued} page(s) around {center}");
        }
        self.wake(queued);
        queued
    }

    /// Drop every cached page and forget in-flight renders.
    ///
    /// Renders already running finish, but their results are discarded.
    pub fn clear(&self) {
        self.shared.lock().invalidate();
    }

    /// Change the render target; starts a new epoch if it differs.
    ///
    /// Returns true when the cache was invalidated.
    pub fn set_render_params(&self, params: RenderParams) -> bool {
        let mut state = self.shared.lock();
        if state.params == params {
            return false;
        }
        state.params = params;
        state.invalidate();
        true
    }

    /// Swap in a new document handle and start a new epoch
    pub fn set_document(&self, document: Arc<dyn PageRenderer>) {
        let page_count = document.page_count();
        let mut state = self.shared.lock();
        state.document = document;
        state.page_count = page_count;
        state.invalidate();
    }

    /// Record the page on screen; it is never evicted while displayed.
    ///
    /// Also releases the pin on the last page handed to a foreground waiter.
    pub fn mark_displayed(&self, page: PageNumber) {
        let mut state = self.shared.lock();
        state.displayed = Some(page);
        state.handed_off = None;
        state.store.touch(page);
    }

    #[must_use]
    pub fn render_params(&self) -> RenderParams {
        self.shared.lock().params
    }

    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.shared.lock().epoch
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.shared.lock().page_count
    }

    #[must_use]
    pub fn is_in_flight(&self, page: PageNumber) -> bool {
        self.shared.lock().registry.contains(page)
    }

    /// Cached pages in ascending order
    #[must_use]
    pub fn cached_pages(&self) -> Vec<PageNumber> {
        self.shared.lock().store.pages()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock();
        CacheStats {
            epoch: state.epoch,
            cached_pages: state.store.len(),
            in_flight: state.registry.len(),
            ..state.stats
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    fn wake(&self, jobs: usize) {
        for _ in 0..jobs {
            let _ = self.signals.send(WorkerSignal::Work);
        }
    }
}

impl Drop for CacheController {
    fn drop(&mut self) {
        self.clear();
        for _ in 0..self.workers {
            let _ = self.signals.send(WorkerSignal::Shutdown);
        }
    }
}
