//! The settlement state machine.
//!
//! Every way of settling a [`Deferred`] (resolver, rejecter, executor
//! failure, handler outcome) ends in one `update` step, which defers the real
//! work to the runtime's scheduler. The scheduled step ignores anything that
//! arrives after the first settlement, adopts thenables, and otherwise
//! records the outcome and drains the matching reaction queue.
//!
//! Resolvers, rejecters and settlements waiting in the scheduler all hold a
//! settler token. When the last token of a pending deferred goes away nothing
//! can settle it anymore: its reactions are dropped and it stays abandoned.
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::error::Error;
use crate::reaction::{OnFulfilled, OnRejected, Reaction, Reactions};
use crate::reporter::UncaughtRejection;
use crate::runtime::Runtime;
use crate::settlement::{Settlement, State, Thenable};

enum Slot<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Slot<T, E> {
    fn state(&self) -> State {
        match self {
            Slot::Pending => State::Pending,
            Slot::Fulfilled(_) => State::Fulfilled,
            Slot::Rejected(_) => State::Rejected,
        }
    }
}

struct Inner<T, E> {
    slot: Slot<T, E>,
    reactions: Reactions<T, E>,
    /// Set as soon as any reaction pair is registered.
    handled: bool,
    reported: bool,
    adoptions: usize,
    /// Pending with no settler left. Reactions registered from now on are
    /// dropped on arrival.
    abandoned: bool,
}

/// What a drain turn found to do, computed under the borrow and acted on
/// after it is released.
enum Drain<T, E> {
    Idle,
    Fulfilled(T, Vec<OnFulfilled<T>>, Vec<OnRejected<E>>),
    Rejected(E, Vec<OnRejected<E>>, Vec<OnFulfilled<T>>),
    Uncaught(E),
}

struct Core<T, E> {
    rt: Rc<Runtime>,
    inner: RefCell<Inner<T, E>>,
    settlers: Cell<usize>,
}

impl<T, E> Core<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    fn new(rt: Rc<Runtime>) -> Self {
        Self {
            rt,
            inner: RefCell::new(Inner {
                slot: Slot::Pending,
                reactions: Reactions::default(),
                handled: false,
                reported: false,
                adoptions: 0,
                abandoned: false,
            }),
            settlers: Cell::new(0),
        }
    }

    fn apply(self: &Rc<Self>, settlement: Settlement<T, E>) {
        if !self.inner.borrow().slot.state().is_pending() {
            tracing::trace!("already settled, ignoring settlement");
            return;
        }
        match settlement {
            Settlement::Adopt(thenable) => {
                let adoptions = {
                    let mut inner = self.inner.borrow_mut();
                    inner.adoptions += 1;
                    inner.adoptions
                };
                if let Some(limit) = self.rt.config().max_adoption_depth {
                    if adoptions > limit {
                        tracing::error!(
                            adoptions,
                            error = %Error::AdoptionDepthExceeded { limit },
                            "refusing to adopt thenable"
                        );
                        return;
                    }
                }
                tracing::debug!(adoptions, "adopting thenable");
                let settler = Settler::new(Rc::clone(self));
                thenable.subscribe(
                    Resolver { settler: settler.clone() },
                    Rejecter { settler },
                );
            }
            Settlement::Fulfill(value) => {
                tracing::debug!("fulfilled");
                self.inner.borrow_mut().slot = Slot::Fulfilled(value);
                self.drain();
            }
            Settlement::Reject(reason) => {
                tracing::debug!(?reason, "rejected");
                self.inner.borrow_mut().slot = Slot::Rejected(reason);
                self.drain();
            }
        }
    }

    fn register(&self, reaction: Reaction<T, E>) {
        let mut inner = self.inner.borrow_mut();
        inner.handled = true;
        if inner.abandoned {
            drop(inner);
            tracing::trace!("deferred abandoned, dropping reaction");
            drop(reaction);
            return;
        }
        inner.reactions.push(reaction);
        tracing::trace!(
            queued = inner.reactions.len(),
            state = ?inner.slot.state(),
            "reaction registered"
        );
    }

    fn schedule_drain(self: &Rc<Self>) {
        let core = Rc::clone(self);
        self.rt.schedule(Box::new(move || core.drain()));
    }

    fn drain(&self) {
        let drain = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            match &inner.slot {
                Slot::Pending => Drain::Idle,
                Slot::Fulfilled(value) => {
                    let (fulfilled, rejected) = inner.reactions.take();
                    Drain::Fulfilled(value.clone(), fulfilled, rejected)
                }
                Slot::Rejected(reason) => {
                    if inner.reactions.is_empty() && !inner.handled {
                        if inner.reported {
                            Drain::Idle
                        } else {
                            inner.reported = true;
                            Drain::Uncaught(reason.clone())
                        }
                    } else {
                        let (fulfilled, rejected) = inner.reactions.take();
                        Drain::Rejected(reason.clone(), rejected, fulfilled)
                    }
                }
            }
        };

        // No borrow is held from here on, handlers may touch this deferred.
        match drain {
            Drain::Idle => {}
            Drain::Fulfilled(value, reactions, discarded) => {
                drop(discarded);
                tracing::trace!(count = reactions.len(), "draining fulfilled reactions");
                for reaction in reactions {
                    reaction(value.clone());
                }
            }
            Drain::Rejected(reason, reactions, discarded) => {
                drop(discarded);
                tracing::trace!(count = reactions.len(), "draining rejected reactions");
                for reaction in reactions {
                    reaction(reason.clone());
                }
            }
            Drain::Uncaught(reason) => {
                self.rt.report_uncaught(UncaughtRejection::new(reason));
            }
        }
    }
}

impl<T, E> Core<T, E> {
    /// The last settler is gone. A pending deferred can never settle now.
    fn abandon(&self) {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            if !inner.slot.state().is_pending() {
                return;
            }
            inner.abandoned = true;
            inner.reactions.take()
        };
        tracing::debug!(reactions = dropped.0.len(), "no settler left, deferred abandoned");
        // Dropped outside the borrow, downstream settlers go with them.
        drop(dropped);
    }
}

/// Counted handle on a core that is still able to settle it.
struct Settler<T, E> {
    core: Rc<Core<T, E>>,
}

impl<T, E> Settler<T, E> {
    fn new(core: Rc<Core<T, E>>) -> Self {
        core.settlers.set(core.settlers.get() + 1);
        Self { core }
    }
}

impl<T, E> Settler<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    /// Schedule the settlement. The task keeps its own token so a queued
    /// settlement is never mistaken for abandonment.
    fn update(&self, settlement: Settlement<T, E>) {
        let settler = self.clone();
        self.core
            .rt
            .schedule(Box::new(move || settler.core.apply(settlement)));
    }
}

impl<T, E> Clone for Settler<T, E> {
    fn clone(&self) -> Self {
        Self::new(Rc::clone(&self.core))
    }
}

impl<T, E> Drop for Settler<T, E> {
    fn drop(&mut self) {
        let left = self.core.settlers.get() - 1;
        self.core.settlers.set(left);
        if left == 0 {
            self.core.abandon();
        }
    }
}

/// Settles its deferred with a value, or makes it adopt a thenable.
pub struct Resolver<T, E> {
    settler: Settler<T, E>,
}

/// Settles its deferred with a rejection reason.
pub struct Rejecter<T, E> {
    settler: Settler<T, E>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self { settler: self.settler.clone() }
    }
}

impl<T, E> Clone for Rejecter<T, E> {
    fn clone(&self) -> Self {
        Self { settler: self.settler.clone() }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    pub fn resolve(&self, value: T) {
        self.settler.update(Settlement::Fulfill(value));
    }

    /// Make the deferred follow `thenable`.
    pub fn adopt(&self, thenable: impl Thenable<T, E> + 'static) {
        self.settler.update(Settlement::adopt(thenable));
    }

    pub fn settle(&self, settlement: Settlement<T, E>) {
        self.settler.update(settlement);
    }
}

impl<T, E> Rejecter<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    /// `reason` is stored as is. A thenable reason is not adopted, use
    /// [`Resolver::adopt`] to follow another deferred's outcome.
    pub fn reject(&self, reason: E) {
        self.settler.update(Settlement::Reject(reason));
    }
}

/// A value that is available now, later, or never.
///
/// Handles are cheap to clone and all point at the same instance.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Runtime, Settlement};
///
/// let (rt, queue) = Runtime::local();
/// let d = Deferred::<i32, String>::resolve(&rt, 5)
///     .then(|v| Settlement::Fulfill(v + 2))
///     .then(|v| Settlement::Fulfill(v + 2));
/// queue.run_until_idle();
/// assert_eq!(d.settled(), Some(Ok(9)));
/// ```
pub struct Deferred<T, E> {
    core: Rc<Core<T, E>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self { core: Rc::clone(&self.core) }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    /// Create a deferred and run `executor` with its resolver and rejecter,
    /// synchronously. An `Err` returned by the executor rejects it.
    pub fn new<F>(rt: &Rc<Runtime>, executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E>,
    {
        let core = Rc::new(Core::new(Rc::clone(rt)));
        // Held across the executor so an executor failure can still settle.
        let guard = Settler::new(Rc::clone(&core));
        let resolver = Resolver { settler: guard.clone() };
        let rejecter = Rejecter { settler: guard.clone() };
        if let Err(reason) = executor(resolver, rejecter) {
            tracing::debug!(?reason, "executor failed");
            guard.update(Settlement::Reject(reason));
        }
        drop(guard);
        Self { core }
    }

    pub fn resolve(rt: &Rc<Runtime>, value: T) -> Self {
        Self::new(rt, |resolve, _| {
            resolve.resolve(value);
            Ok(())
        })
    }

    pub fn reject(rt: &Rc<Runtime>, reason: E) -> Self {
        Self::new(rt, |_, reject| {
            reject.reject(reason);
            Ok(())
        })
    }

    /// Like [`Deferred::resolve`], but also accepts a thenable to adopt.
    pub fn from_settlement(rt: &Rc<Runtime>, settlement: Settlement<T, E>) -> Self {
        Self::new(rt, |resolve, _| {
            resolve.settle(settlement);
            Ok(())
        })
    }

    pub fn is_thenable(settlement: &Settlement<T, E>) -> bool {
        settlement.is_thenable()
    }

    pub fn state(&self) -> State {
        self.core.inner.borrow().slot.state()
    }

    /// The outcome, once settled.
    pub fn settled(&self) -> Option<Result<T, E>> {
        match &self.core.inner.borrow().slot {
            Slot::Pending => None,
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.core.rt
    }

    /// Queue a reaction pair and schedule a drain. The drain is scheduled even
    /// when already settled so nothing ever runs inside the registering call.
    pub(crate) fn register(&self, reaction: Reaction<T, E>) {
        self.core.register(reaction);
        self.core.schedule_drain();
    }
}

impl<T, E> Thenable<T, E> for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    fn subscribe(&self, resolve: Resolver<T, E>, reject: Rejecter<T, E>) {
        self.register(Reaction::new(
            move |value| resolve.resolve(value),
            move |reason| reject.reject(reason),
        ));
    }
}

impl<T, E> Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.core.inner.borrow();
        f.debug_struct("Deferred")
            .field("state", &inner.slot.state())
            .field("reactions", &inner.reactions.len())
            .finish()
    }
}
