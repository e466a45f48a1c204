//! Render job, settlement and preload handle types

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, TryRecvError};

use crate::document::PageRenderer;
use crate::types::{Epoch, PageNumber, RenderParams};

/// Unique identifier for render tasks, never reused within a controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Work item pulled by render workers
pub struct RenderJob {
    pub id: TaskId,
    pub page: PageNumber,
    /// Epoch active when the task was created
    pub epoch: Epoch,
    pub params: RenderParams,
    /// Document handle the task was created against
    pub renderer: Arc<dyn PageRenderer>,
}

impl fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderJob")
            .field("id", &self.id)
            .field("page", &self.page)
            .field("epoch", &self.epoch)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Signals sent to render workers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerSignal {
    /// A job was queued
    Work,
    /// Stop the worker
    Shutdown,
}

/// How a preload ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The page is in the cache
    Ready,
    /// The render failed or the page does not exist
    Failed,
    /// The cache was cleared before the render settled
    Discarded,
}

/// Handle returned by `preload`.
///
/// Every caller preloading the same page gets its own handle onto the
/// same underlying render.
#[derive(Debug)]
pub struct Preload {
    page: PageNumber,
    state: PreloadState,
}

#[derive(Debug)]
enum PreloadState {
    Settled(Settlement),
    Pending(Receiver<Settlement>),
}

impl Preload {
    pub(crate) fn settled(page: PageNumber, settlement: Settlement) -> Self {
        Self {
            page,
            state: PreloadState::Settled(settlement),
        }
    }

    pub(crate) fn pending(page: PageNumber, rx: Receiver<Settlement>) -> Self {
        Self {
            page,
            state: PreloadState::Pending(rx),
        }
    }

    #[must_use]
    pub fn page(&self) -> PageNumber {
        self.page
    }

    /// Block until the render settles
    pub fn wait(self) -> Settlement {
        match self.state {
            PreloadState::Settled(s) => s,
            // sender dropped by a clear
            PreloadState::Pending(rx) => rx.recv().unwrap_or(Settlement::Discarded),
        }
    }

    /// Block for at most `timeout`; `None` if the render is still running
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Settlement> {
        let settlement = match &self.state {
            PreloadState::Settled(s) => return Some(*s),
            PreloadState::Pending(rx) => match rx.recv_timeout(timeout) {
                Ok(s) => s,
                Err(RecvTimeoutError::Disconnected) => Settlement::Discarded,
                Err(RecvTimeoutError::Timeout) => return None,
            },
        };
        self.state = PreloadState::Settled(settlement);
        Some(settlement)
    }

    /// Non-blocking check
    pub fn try_settlement(&mut self) -> Option<Settlement> {
        let settlement = match &self.state {
            PreloadState::Settled(s) => return Some(*s),
            PreloadState::Pending(rx) => match rx.try_recv() {
                Ok(s) => s,
                Err(TryRecvError::Disconnected) => Settlement::Discarded,
                Err(TryRecvError::Empty) => return None,
            },
        };
        self.state = PreloadState::Settled(settlement);
        Some(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_handle_returns_immediately() {
        let mut handle = Preload::settled(4, Settlement::Ready);
        assert_eq!(handle.page(), 4);
        assert_eq!(handle.try_settlement(), Some(Settlement::Ready));
        assert_eq!(handle.wait(), Settlement::Ready);
    }

    #[test]
    fn dropped_sender_reads_as_discarded() {
        let (tx, rx) = flume::bounded(1);
        let mut handle = Preload::pending(2, rx);
        assert_eq!(handle.try_settlement(), None);

        drop(tx);
        assert_eq!(handle.wait_timeout(Duration::from_millis(10)), Some(Settlement::Discarded));
    }

    #[test]
    fn pending_handle_times_out_then_settles() {
        let (tx, rx) = flume::bounded(1);
        let mut handle = Preload::pending(2, rx);
        assert_eq!(handle.wait_timeout(Duration::from_millis(5)), None);

        tx.send(Settlement::Failed).unwrap();
        assert_eq!(handle.wait(), Settlement::Failed);
    }
}
