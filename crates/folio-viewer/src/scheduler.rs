//! Cooperative task queue.
//!
//! Everything runs on one thread. Long work is split into tasks that the
//! viewer pulls from the queue one at a time; after each task the slice
//! deadline is checked and control returns to the host when it has passed.
//! A task that cannot finish (an image it needs is still being fetched)
//! asks to be put back and runs again later.
//!
//! Every queued task remembers the [`GenerationToken`] value it was queued
//! under. Resizing or reloading advances the token, and tasks from an older
//! generation are dropped without running. A task that was already running
//! when the token moved checks it again before committing anything.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Default time slice before yielding to the host.
pub const DEFAULT_SLICE: Duration = Duration::from_millis(16);

/// Shared, monotonically increasing generation counter.
///
/// Clones share the counter, so a handle given to the host can invalidate
/// work the viewer has queued.
#[derive(Debug, Clone, Default)]
pub struct GenerationToken(Rc<Cell<u64>>);

impl GenerationToken {
    /// Counter at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.get()
    }

    /// Start a new generation and return it. Everything tagged with an
    /// earlier one becomes stale.
    pub fn advance(&self) -> u64 {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }

    /// `generation` is still the current one.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.0.get() == generation
    }
}

/// A task with the generation it was queued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queued<T> {
    /// Generation at queue time.
    pub generation: u64,
    /// The work.
    pub task: T,
}

/// What became of a task that ran.
#[derive(Debug)]
pub enum TaskOutcome<E> {
    /// Finished.
    Done,
    /// Waiting on something; run again later.
    Suspend,
    /// Aborted. Only this task is affected.
    Failed(E),
}

/// FIFO of cooperative tasks.
pub struct Scheduler<T> {
    queue: VecDeque<Queued<T>>,
    token: GenerationToken,
    slice: Duration,
    discarded: usize,
}

impl<T: fmt::Debug> Scheduler<T> {
    /// Empty queue on `token`, yielding after `slice`.
    #[must_use]
    pub fn new(token: GenerationToken, slice: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            token,
            slice,
            discarded: 0,
        }
    }

    /// The generation counter tasks are checked against.
    #[must_use]
    pub const fn token(&self) -> &GenerationToken {
        &self.token
    }

    /// Length of one slice.
    #[must_use]
    pub const fn slice(&self) -> Duration {
        self.slice
    }

    /// Deadline of a slice starting now.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.slice
    }

    /// Queue `task` under the current generation.
    pub fn push(&mut self, task: T) {
        self.queue.push_back(Queued {
            generation: self.token.current(),
            task,
        });
    }

    /// Put a suspended task back at the end, keeping its generation.
    pub fn requeue(&mut self, queued: Queued<T>) {
        self.queue.push_back(queued);
    }

    /// Next task of the current generation. Stale tasks in front of it are
    /// dropped.
    pub fn next_task(&mut self) -> Option<Queued<T>> {
        while let Some(queued) = self.queue.pop_front() {
            if self.token.is_current(queued.generation) {
                return Some(queued);
            }
            self.discarded += 1;
            tracing::debug!(task = ?queued.task, generation = queued.generation, "dropping stale task");
        }
        None
    }

    /// A task equal to `task` is queued under the current generation.
    #[must_use]
    pub fn contains(&self, task: &T) -> bool
    where
        T: PartialEq,
    {
        self.queue
            .iter()
            .any(|q| q.task == *task && self.token.is_current(q.generation))
    }

    /// Nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued tasks, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Stale tasks and results dropped so far.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Count a result dropped by its own generation check.
    pub fn note_discarded(&mut self) {
        self.discarded += 1;
    }

    /// Drop every queued task.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queue.len())
            .field("generation", &self.token.current())
            .field("discarded", &self.discarded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_queue_order() {
        let mut scheduler = Scheduler::new(GenerationToken::new(), DEFAULT_SLICE);
        scheduler.push("a");
        scheduler.push("b");
        let first = scheduler.next_task().unwrap();
        scheduler.requeue(first);
        let order: Vec<&str> = std::iter::from_fn(|| scheduler.next_task().map(|q| q.task)).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_stale_tasks_are_dropped() {
        let token = GenerationToken::new();
        let mut scheduler = Scheduler::new(token.clone(), DEFAULT_SLICE);
        scheduler.push(1);
        scheduler.push(2);
        let _ = token.advance();
        scheduler.push(3);
        assert!(!scheduler.contains(&1));
        assert!(scheduler.contains(&3));
        assert_eq!(scheduler.next_task().map(|q| q.task), Some(3));
        assert_eq!(scheduler.discarded(), 2);
        assert!(scheduler.next_task().is_none());
    }

    #[test]
    fn test_requeued_task_keeps_its_generation() {
        let token = GenerationToken::new();
        let mut scheduler = Scheduler::new(token.clone(), DEFAULT_SLICE);
        scheduler.push("layout");
        let running = scheduler.next_task().unwrap();
        let _ = token.advance();
        assert!(!token.is_current(running.generation));
        scheduler.requeue(running);
        assert!(scheduler.next_task().is_none());
    }
}
