use std::cell::RefCell;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::deferred::Deferred;
use crate::error::Error;
use crate::reaction::Reaction;

/// A [`Future`] that completes when its deferred settles.
///
/// The waiter does not drive the scheduler, whoever owns the queue still has
/// to run it. If the last [`Resolver`](crate::Resolver) and
/// [`Rejecter`](crate::Rejecter) of the deferred are dropped before it
/// settles, the waiter completes with [`Error::Abandoned`], even while
/// [`Deferred`] handles are still around.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Runtime};
/// use futures::executor::block_on;
///
/// let (rt, queue) = Runtime::local();
/// let d = Deferred::<String, String>::resolve(&rt, "🍓".into());
/// let waiter = d.waiter();
/// queue.run_until_idle();
/// assert_eq!(block_on(waiter).unwrap(), Ok("🍓".to_string()));
/// ```
#[derive(Debug)]
pub struct Waiter<T, E> {
    shared: Rc<RefCell<Shared<T, E>>>,
}

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

#[derive(Debug)]
struct Shared<T, E> {
    value: Option<Result<T, E>>,
    waker: Result<Waker, WakerState>,
}

impl<T, E> Shared<T, E> {
    fn taint(&mut self) -> Option<Waker> {
        std::mem::replace(&mut self.waker, Err(WakerState::Tainted)).ok()
    }
}

/// Owned jointly by both halves of the waiter's reaction pair, so it drops
/// once the pair is gone, delivered or not.
struct Delivery<T, E> {
    shared: Rc<RefCell<Shared<T, E>>>,
}

impl<T, E> Delivery<T, E> {
    fn deliver(&self, value: Result<T, E>) {
        let waker = {
            let mut shared = self.shared.borrow_mut();
            shared.value = Some(value);
            shared.taint()
        };
        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

impl<T, E> Drop for Delivery<T, E> {
    /// If nothing was delivered, wake the waiter so it sees the taint.
    fn drop(&mut self) {
        let waker = {
            let mut shared = self.shared.borrow_mut();
            if shared.value.is_some() {
                return;
            }
            shared.taint()
        };
        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + Debug + 'static,
{
    /// Await this deferred from async code.
    pub fn waiter(&self) -> Waiter<T, E> {
        let shared = Rc::new(RefCell::new(Shared {
            value: None,
            waker: Err(WakerState::Fresh),
        }));
        let on_fulfilled = Rc::new(Delivery { shared: Rc::clone(&shared) });
        let on_rejected = Rc::clone(&on_fulfilled);
        self.register(Reaction::new(
            move |value| on_fulfilled.deliver(Ok(value)),
            move |reason| on_rejected.deliver(Err(reason)),
        ));
        Waiter { shared }
    }
}

impl<T, E> Future for Waiter<T, E> {
    type Output = Result<Result<T, E>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        match shared.value.take() {
            Some(value) => Poll::Ready(Ok(value)),
            None => match std::mem::replace(&mut shared.waker, Ok(cx.waker().clone())) {
                Err(WakerState::Tainted) => Poll::Ready(Err(Error::Abandoned)),
                _ => Poll::Pending,
            },
        }
    }
}
