//! Per-instance continuation queues.
//!
//! One registration always lands in both queues, whatever the current state.
//! The queue that does not match the final state is dropped uninvoked.

pub(crate) type OnFulfilled<T> = Box<dyn FnOnce(T)>;
pub(crate) type OnRejected<E> = Box<dyn FnOnce(E)>;

/// A success continuation and its paired failure continuation.
pub(crate) struct Reaction<T, E> {
    on_fulfilled: OnFulfilled<T>,
    on_rejected: OnRejected<E>,
}

impl<T, E> Reaction<T, E> {
    pub(crate) fn new(
        on_fulfilled: impl FnOnce(T) + 'static,
        on_rejected: impl FnOnce(E) + 'static,
    ) -> Self {
        Self {
            on_fulfilled: Box::new(on_fulfilled),
            on_rejected: Box::new(on_rejected),
        }
    }
}

pub(crate) struct Reactions<T, E> {
    fulfilled: Vec<OnFulfilled<T>>,
    rejected: Vec<OnRejected<E>>,
}

impl<T, E> Default for Reactions<T, E> {
    fn default() -> Self {
        Self {
            fulfilled: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T, E> Reactions<T, E> {
    pub(crate) fn push(&mut self, reaction: Reaction<T, E>) {
        self.fulfilled.push(reaction.on_fulfilled);
        self.rejected.push(reaction.on_rejected);
        debug_assert_eq!(self.fulfilled.len(), self.rejected.len());
    }

    /// Take both sides. The caller invokes the one matching the final state
    /// and drops the other, outside of any borrow on the owning deferred.
    pub(crate) fn take(&mut self) -> (Vec<OnFulfilled<T>>, Vec<OnRejected<E>>) {
        (
            std::mem::take(&mut self.fulfilled),
            std::mem::take(&mut self.rejected),
        )
    }

    /// Number of registered pairs. Both sides always hold the same count.
    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.fulfilled.len(), self.rejected.len());
        self.fulfilled.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fulfilled.is_empty() && self.rejected.is_empty()
    }
}
