//! `then`, `catch`, `finally` and `race`.
//!
//! Each combinator builds its result through [`Deferred::new`], registering a
//! single reaction pair on the parent from inside the executor. A missing
//! handler is spelled as the pass-through constructor (`Settlement::Fulfill`
//! or `Settlement::Reject`).
use std::cell::Cell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::deferred::Deferred;
use crate::reaction::Reaction;
use crate::runtime::Runtime;
use crate::settlement::{Settlement, Thenable};

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    /// Map the fulfilled value. A rejection propagates unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Settlement<U, E> + 'static,
    {
        self.chain(on_fulfilled, Settlement::Reject)
    }

    /// Handle both outcomes. Returning [`Settlement::Fulfill`] from
    /// `on_rejected` recovers from the rejection.
    pub fn then_or_else<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Settlement<U, E> + 'static,
        G: FnOnce(E) -> Settlement<U, E> + 'static,
    {
        self.chain(on_fulfilled, on_rejected)
    }

    /// Handle a rejection. A fulfilled value passes through unchanged.
    ///
    /// ```
    /// use deferred::{Deferred, Runtime, Settlement};
    ///
    /// let (rt, queue) = Runtime::local();
    /// let d = Deferred::<String, String>::reject(&rt, "err".into())
    ///     .then(|v| Settlement::Fulfill(v))
    ///     .catch(|e| Settlement::Fulfill(e + "!"));
    /// queue.run_until_idle();
    /// assert_eq!(d.settled(), Some(Ok("err!".to_string())));
    /// ```
    pub fn catch<G>(&self, on_rejected: G) -> Deferred<T, E>
    where
        G: FnOnce(E) -> Settlement<T, E> + 'static,
    {
        self.chain(Settlement::Fulfill, on_rejected)
    }

    /// Run `on_finally` once, whatever the outcome, and pass the outcome on
    /// untouched. If `on_finally` fails, its error rejects the result instead.
    pub fn finally<F>(&self, on_finally: F) -> Deferred<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        // Only one of the two branches is ever invoked.
        let on_fulfilled = Rc::new(Cell::new(Some(on_finally)));
        let on_rejected = Rc::clone(&on_fulfilled);
        self.chain(
            move |value| match run_once(&on_fulfilled) {
                Ok(()) => Settlement::Fulfill(value),
                Err(error) => Settlement::Reject(error),
            },
            move |reason| match run_once(&on_rejected) {
                Ok(()) => Settlement::Reject(reason),
                Err(error) => Settlement::Reject(error),
            },
        )
    }

    /// Settle the same way as whichever contender settles first. With no
    /// contenders the result stays pending.
    pub fn race(rt: &Rc<Runtime>, contenders: impl IntoIterator<Item = Deferred<T, E>>) -> Self {
        Self::new(rt, |resolve, reject| {
            for contender in contenders {
                contender.subscribe(resolve.clone(), reject.clone());
            }
            Ok(())
        })
    }

    fn chain<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Settlement<U, E> + 'static,
        G: FnOnce(E) -> Settlement<U, E> + 'static,
    {
        Deferred::new(self.runtime(), |resolve, _| {
            let recover = resolve.clone();
            self.register(Reaction::new(
                move |value| resolve.settle(on_fulfilled(value)),
                move |reason| recover.settle(on_rejected(reason)),
            ));
            Ok(())
        })
    }
}

fn run_once<E, F: FnOnce() -> Result<(), E>>(slot: &Cell<Option<F>>) -> Result<(), E> {
    slot.take().map_or(Ok(()), |f| f())
}

#[cfg(test)]
mod tests {
    use crate::deferred::Deferred;
    use crate::runtime::Runtime;
    use crate::settlement::{Settlement, State};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_then_chain_adds_up() {
        let (rt, queue) = Runtime::local();
        let d = Deferred::<i32, String>::resolve(&rt, 5)
            .then(|v| Settlement::Fulfill(v + 2))
            .then(|v| Settlement::Fulfill(v + 2));
        queue.run_until_idle();
        assert_eq!(d.settled(), Some(Ok(9)));
    }

    #[test]
    fn test_then_changes_value_type() {
        let (rt, queue) = Runtime::local();
        let d = Deferred::<i32, ()>::resolve(&rt, 42)
            .then(|v| Settlement::Fulfill(v.to_string()));
        queue.run_until_idle();
        assert_eq!(d.settled(), Some(Ok("42".to_string())));
    }

    #[test]
    fn test_handler_failure_leaves_parent_alone() {
        let (rt, queue) = Runtime::local();
        let parent = Deferred::<i32, String>::resolve(&rt, 1);
        let child = parent.then(|_| Settlement::<i32, String>::Reject("boom".into()));
        let caught = child.catch(|e| Settlement::Fulfill(e.len() as i32));
        queue.run_until_idle();
        assert_eq!(parent.settled(), Some(Ok(1)));
        assert_eq!(child.settled(), Some(Err("boom".to_string())));
        assert_eq!(caught.settled(), Some(Ok(4)));
    }

    #[test]
    fn test_then_or_else_recovers() {
        let (rt, queue) = Runtime::local();
        let d = Deferred::<i32, String>::reject(&rt, "bad".into())
            .then_or_else(
                |v| Settlement::Fulfill(v * 10),
                |e| Settlement::Fulfill(e.len() as i32),
            );
        queue.run_until_idle();
        assert_eq!(d.settled(), Some(Ok(3)));
    }

    #[test]
    fn test_catch_skipped_on_fulfilment() {
        let (rt, queue) = Runtime::local();
        let called = Rc::new(RefCell::new(false));
        let flag = called.clone();
        let d = Deferred::<i32, String>::resolve(&rt, 5).catch(move |e| {
            *flag.borrow_mut() = true;
            Settlement::Reject(e)
        });
        queue.run_until_idle();
        assert!(!*called.borrow());
        assert_eq!(d.settled(), Some(Ok(5)));
    }

    #[test]
    fn test_finally_runs_once_and_is_transparent() {
        let (rt, queue) = Runtime::local();
        let calls = Rc::new(RefCell::new(0));

        let c = calls.clone();
        let ok = Deferred::<i32, String>::resolve(&rt, 3).finally(move || {
            *c.borrow_mut() += 1;
            Ok(())
        });
        let c = calls.clone();
        let err = Deferred::<i32, String>::reject(&rt, "no".into()).finally(move || {
            *c.borrow_mut() += 1;
            Ok(())
        });
        let caught = err.catch(|e| Settlement::Fulfill(e.len() as i32));
        queue.run_until_idle();

        assert_eq!(*calls.borrow(), 2);
        assert_eq!(ok.settled(), Some(Ok(3)));
        assert_eq!(err.settled(), Some(Err("no".to_string())));
        assert_eq!(caught.settled(), Some(Ok(2)));
    }

    #[test]
    fn test_finally_failure_rejects() {
        let (rt, queue) = Runtime::local();
        let d = Deferred::<i32, String>::resolve(&rt, 3).finally(|| Err("cleanup".into()));
        let _handled = d.catch(|_| Settlement::Fulfill(0));
        queue.run_until_idle();
        assert_eq!(d.settled(), Some(Err("cleanup".to_string())));
    }

    #[test]
    fn test_race_takes_first_settled() {
        let (rt, queue) = Runtime::local();
        let slow = Deferred::<i32, String>::resolve(&rt, 1).then(|v| Settlement::Fulfill(v + 1));
        let fast = Deferred::<i32, String>::reject(&rt, "deadline".into());
        let winner = Deferred::race(&rt, [slow.clone(), fast]);
        let recovered = winner.catch(|e| Settlement::Fulfill(e.len() as i32));
        queue.run_until_idle();
        assert_eq!(winner.settled(), Some(Err("deadline".to_string())));
        assert_eq!(recovered.settled(), Some(Ok(8)));
        assert_eq!(slow.settled(), Some(Ok(2)));
        assert_eq!(rt.uncaught_count(), 0);
    }

    #[test]
    fn test_race_without_contenders_stays_pending() {
        let (rt, queue) = Runtime::local();
        let d = Deferred::<i32, String>::race(&rt, Vec::new());
        queue.run_until_idle();
        assert_eq!(d.state(), State::Pending);
    }
}
