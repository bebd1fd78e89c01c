//! The microtask queue every deferred notification goes through.
//!
//! A [`Scheduler`] only promises one thing: a scheduled task runs after the
//! code that scheduled it has returned, and tasks run in the order they were
//! scheduled. [`MicrotaskQueue`] is the in-crate implementation. Nothing runs
//! until its owner turns the crank with [`MicrotaskQueue::run_once`],
//! [`MicrotaskQueue::run_turns`] or [`MicrotaskQueue::run_until_idle`].
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Defers tasks to a later turn, in FIFO order.
pub trait Scheduler {
    /// Enqueue `task`. Implementations must never run it inline.
    fn schedule(&self, task: Task);
}

/// FIFO queue of [`Task`]s driven explicitly by its owner.
///
/// # Examples
///
/// ```
/// use deferred::{MicrotaskQueue, Scheduler};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let queue = MicrotaskQueue::new();
/// let seen = Rc::new(RefCell::new(vec![]));
/// for i in 0..3 {
///     let seen = seen.clone();
///     queue.schedule(Box::new(move || seen.borrow_mut().push(i)));
/// }
/// assert!(seen.borrow().is_empty());
/// assert_eq!(queue.run_until_idle(), 3);
/// assert_eq!(*seen.borrow(), vec![0, 1, 2]);
/// ```
#[derive(Default)]
pub struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Task>>,
    turns: Cell<u64>,
}

impl MicrotaskQueue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Run the oldest task. Returns `false` if there was nothing to run.
    pub fn run_once(&self) -> bool {
        // The borrow must end before the task runs, tasks schedule more tasks.
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                let turn = self.turns.get() + 1;
                self.turns.set(turn);
                tracing::trace!(turn, pending = self.len(), "running microtask");
                task();
                true
            }
            None => false,
        }
    }

    /// Run at most `limit` tasks and return how many ran.
    pub fn run_turns(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_once() {
            ran += 1;
        }
        ran
    }

    /// Run tasks until the queue is empty, including tasks scheduled while
    /// draining. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Total number of tasks run over the queue's lifetime.
    pub fn turns(&self) -> u64 {
        self.turns.get()
    }
}

impl Scheduler for MicrotaskQueue {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.len())
            .field("turns", &self.turns.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{MicrotaskQueue, Scheduler};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_schedule_never_runs_inline() {
        let queue = MicrotaskQueue::new();
        let ran = Rc::new(RefCell::new(false));
        let flag = ran.clone();
        queue.schedule(Box::new(move || *flag.borrow_mut() = true));
        assert!(!*ran.borrow());
        assert_eq!(queue.len(), 1);
        assert!(queue.run_once());
        assert!(*ran.borrow());
        assert!(!queue.run_once());
    }

    #[test]
    fn test_tasks_scheduled_while_running_go_to_the_back() {
        let queue = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (q, l) = (queue.clone(), log.clone());
        queue.schedule(Box::new(move || {
            l.borrow_mut().push("a");
            let l2 = l.clone();
            q.schedule(Box::new(move || l2.borrow_mut().push("c")));
        }));
        let l = log.clone();
        queue.schedule(Box::new(move || l.borrow_mut().push("b")));

        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(queue.turns(), 3);
    }

    #[test]
    fn test_run_turns_stops_at_limit() {
        let queue = MicrotaskQueue::new();
        for _ in 0..5 {
            queue.schedule(Box::new(|| {}));
        }
        assert_eq!(queue.run_turns(2), 2);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_turns(10), 3);
        assert!(queue.is_empty());
    }
}
