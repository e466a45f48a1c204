//! Two-class render queue and the worker threads that drain it

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use flume::Receiver;
use log::{debug, error};

use crate::controller::Shared;
use crate::error::RenderFault;
use crate::request::{RenderJob, TaskId, WorkerSignal};
use crate::types::Priority;

/// Pending jobs. Foreground jobs are always handed out before background ones.
#[derive(Debug, Default)]
pub struct RenderQueue {
    foreground: VecDeque<RenderJob>,
    background: VecDeque<RenderJob>,
}

impl RenderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: RenderJob, priority: Priority) {
        match priority {
            Priority::Foreground => self.foreground.push_back(job),
            Priority::Background => self.background.push_back(job),
        }
    }

    /// Move a queued background job to the back of the foreground queue
    pub fn promote(&mut self, id: TaskId) -> bool {
        let Some(pos) = self.background.iter().position(|job| job.id == id) else {
            return false;
        };
        match self.background.remove(pos) {
            Some(job) => {
                self.foreground.push_back(job);
                true
            }
            None => false,
        }
    }

    pub fn pop(&mut self) -> Option<RenderJob> {
        self.foreground
            .pop_front()
            .or_else(|| self.background.pop_front())
    }

    /// Drop every queued job, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.len();
        self.foreground.clear();
        self.background.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.foreground.len() + self.background.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foreground.is_empty() && self.background.is_empty()
    }
}

/// Spawn `count` detached worker threads pulling from the shared queue.
///
/// Returns how many actually started; each one exits on its own `Shutdown`.
pub(crate) fn spawn_workers(
    count: usize,
    shared: &Arc<Shared>,
    signals: &Receiver<WorkerSignal>,
) -> usize {
    (0..count.max(1))
        .filter(|i| {
            let shared = Arc::clone(shared);
            let rx = signals.clone();
            thread::Builder::new()
                .name(format!("page-render-{i}"))
                .spawn(move || render_worker(&shared, &rx))
                .map_err(|e| error!("Failed to spawn render worker {i}: {e}"))
                .is_ok()
        })
        .count()
}

/// Main worker loop. One `Work` signal is sent per queued job.
fn render_worker(shared: &Shared, signals: &Receiver<WorkerSignal>) {
    for signal in signals.iter() {
        match signal {
            WorkerSignal::Work => {
                let Some(job) = shared.next_job() else {
                    continue;
                };
                let result = render_job(&job);
                shared.settle(job, result);
            }
            WorkerSignal::Shutdown => break,
        }
    }
    debug!("Render worker {:?} exiting", thread::current().name());
}

fn render_job(job: &RenderJob) -> Result<crate::types::RasterImage, RenderFault> {
    let render = || {
        job.renderer
            .render_page(job.page, job.params.width_px, job.params.scale)
    };
    // a panicking renderer must not take the worker down with it
    panic::catch_unwind(AssertUnwindSafe(render)).unwrap_or_else(|_| {
        Err(RenderFault::generic(format!(
            "renderer panicked on page {}",
            job.page
        )))
    })
}
