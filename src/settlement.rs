use std::fmt;
use std::rc::Rc;

use crate::deferred::{Rejecter, Resolver};

/// Observable state of a [`Deferred`](crate::Deferred).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl State {
    pub fn is_pending(self) -> bool {
        self == State::Pending
    }
}

/// Anything that can settle a resolver later on.
///
/// Resolving with a thenable makes the resolved deferred adopt the
/// thenable's eventual outcome instead of taking it as a plain value.
pub trait Thenable<T, E> {
    /// Arrange for exactly one of `resolve` / `reject` to be called once this
    /// thenable settles.
    fn subscribe(&self, resolve: Resolver<T, E>, reject: Rejecter<T, E>);
}

/// What a handler (or a resolver) hands back to the state machine.
///
/// Returning [`Settlement::Reject`] is how a handler fails, a failure is just
/// a value on the rejection channel.
pub enum Settlement<T, E> {
    Fulfill(T),
    Reject(E),
    Adopt(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Settlement<T, E> {
    /// Wrap a thenable so the target adopts its outcome.
    pub fn adopt(thenable: impl Thenable<T, E> + 'static) -> Self {
        Settlement::Adopt(Rc::new(thenable))
    }

    pub fn is_thenable(&self) -> bool {
        matches!(self, Settlement::Adopt(_))
    }
}

impl<T, E> From<Result<T, E>> for Settlement<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settlement::Fulfill(value),
            Err(reason) => Settlement::Reject(reason),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Settlement<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::Fulfill(value) => f.debug_tuple("Fulfill").field(value).finish(),
            Settlement::Reject(reason) => f.debug_tuple("Reject").field(reason).finish(),
            Settlement::Adopt(_) => f.write_str("Adopt(..)"),
        }
    }
}
