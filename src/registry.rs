//! Bookkeeping for in-flight renders, keyed by page number

use std::collections::HashMap;

use flume::Sender;

use crate::request::{Settlement, TaskId};
use crate::types::{Epoch, PageNumber, Priority};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for a worker
    Queued,
    /// A worker is rendering it
    Running,
}

/// One in-flight render and everyone waiting on it
#[derive(Debug)]
pub struct RenderTask {
    pub id: TaskId,
    pub page: PageNumber,
    pub epoch: Epoch,
    pub priority: Priority,
    pub state: TaskState,
    waiters: Vec<Sender<Settlement>>,
}

impl RenderTask {
    /// Consume the task, yielding the channels to notify on settlement
    pub fn into_waiters(self) -> Vec<Sender<Settlement>> {
        self.waiters
    }

    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

/// At most one task per page. Emptied whenever the epoch changes, so a
/// page maps to at most one task per epoch.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<PageNumber, RenderTask>,
    next_id: u64,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, page: PageNumber) -> Option<&RenderTask> {
        self.tasks.get(&page)
    }

    #[must_use]
    pub fn contains(&self, page: PageNumber) -> bool {
        self.tasks.contains_key(&page)
    }

    /// Register a new queued task. The caller must have checked that no
    /// task exists for `page`.
    pub fn begin(
        &mut self,
        page: PageNumber,
        epoch: Epoch,
        priority: Priority,
        waiter: Option<Sender<Settlement>>,
    ) -> TaskId {
        debug_assert!(!self.tasks.contains_key(&page), "duplicate task for page {page}");

        self.next_id += 1;
        let id = TaskId::new(self.next_id);
        self.tasks.insert(
            page,
            RenderTask {
                id,
                page,
                epoch,
                priority,
                state: TaskState::Queued,
                waiters: waiter.into_iter().collect(),
            },
        );
        id
    }

    /// Attach another waiter to an existing task
    pub fn attach(&mut self, page: PageNumber, waiter: Sender<Settlement>) -> bool {
        match self.tasks.get_mut(&page) {
            Some(task) => {
                task.waiters.push(waiter);
                true
            }
            None => false,
        }
    }

    /// Raise a background task to foreground.
    ///
    /// Returns the task id when the task is still queued and the caller
    /// should move its job to the foreground queue.
    pub fn promote(&mut self, page: PageNumber) -> Option<TaskId> {
        let task = self.tasks.get_mut(&page)?;
        if task.priority == Priority::Foreground {
            return None;
        }
        task.priority = Priority::Foreground;
        (task.state == TaskState::Queued).then_some(task.id)
    }

    /// Move a queued task to running. Fails for unknown ids or tasks a
    /// worker already picked up.
    pub fn claim(&mut self, page: PageNumber, id: TaskId) -> bool {
        match self.tasks.get_mut(&page) {
            Some(task) if task.id == id && task.state == TaskState::Queued => {
                task.state = TaskState::Running;
                true
            }
            _ => false,
        }
    }

    /// Remove a task on settlement, only if `id` still owns the page and
    /// the task was started in the `current` epoch
    pub fn finish(&mut self, page: PageNumber, id: TaskId, current: Epoch) -> Option<RenderTask> {
        if self
            .tasks
            .get(&page)
            .is_some_and(|t| t.id == id && t.epoch == current)
        {
            self.tasks.remove(&page)
        } else {
            None
        }
    }

    /// Forget every task. Dropping the waiters disconnects their handles.
    pub fn drain(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_single_shot() {
        let mut registry = TaskRegistry::new();
        let id = registry.begin(5, Epoch(0), Priority::Foreground, None);

        assert!(registry.claim(5, id));
        assert!(!registry.claim(5, id));
        assert_eq!(registry.get(5).map(|t| t.state), Some(TaskState::Running));
    }

    #[test]
    fn finish_ignores_foreign_ids() {
        let mut registry = TaskRegistry::new();
        let old = registry.begin(5, Epoch(0), Priority::Background, None);
        registry.drain();
        let new = registry.begin(5, Epoch(1), Priority::Background, None);

        assert_ne!(old, new);
        assert!(registry.finish(5, old, Epoch(1)).is_none());
        assert!(registry.finish(5, new, Epoch(1)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn finish_rejects_other_epochs() {
        let mut registry = TaskRegistry::new();
        let id = registry.begin(5, Epoch(2), Priority::Foreground, None);

        assert!(registry.finish(5, id, Epoch(3)).is_none());
        assert!(registry.contains(5));
        assert!(registry.finish(5, id, Epoch(2)).is_some());
    }

    #[test]
    fn promote_queued_background_task() {
        let mut registry = TaskRegistry::new();
        let id = registry.begin(3, Epoch(0), Priority::Background, None);

        assert_eq!(registry.promote(3), Some(id));
        assert_eq!(registry.get(3).map(|t| t.priority), Some(Priority::Foreground));
        // already foreground
        assert_eq!(registry.promote(3), None);
    }

    #[test]
    fn promote_running_task_only_relabels() {
        let mut registry = TaskRegistry::new();
        let id = registry.begin(3, Epoch(0), Priority::Background, None);
        registry.claim(3, id);

        assert_eq!(registry.promote(3), None);
        assert_eq!(registry.get(3).map(|t| t.priority), Some(Priority::Foreground));
    }

    #[test]
    fn drain_disconnects_waiters() {
        let mut registry = TaskRegistry::new();
        let (tx, rx) = flume::bounded(1);
        registry.begin(7, Epoch(0), Priority::Foreground, Some(tx));
        let (tx2, rx2) = flume::bounded(1);
        assert!(registry.attach(7, tx2));
        assert_eq!(registry.get(7).map(RenderTask::waiter_count), Some(2));

        assert_eq!(registry.drain(), 1);
        assert!(rx.recv().is_err());
        assert!(rx2.recv().is_err());
    }
}
