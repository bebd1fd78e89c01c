//! Single-threaded deferred values.
//!
//! A [`Deferred`] is pending until something settles it, then fulfilled or
//! rejected for good. Continuations registered with [`Deferred::then`],
//! [`Deferred::catch`] and [`Deferred::finally`] never run inside the call
//! that registers them or the call that settles: every notification goes
//! through the [`Scheduler`] of the [`Runtime`] the deferred was created in,
//! in FIFO order.
//!
//! Failures are values. A handler fails by returning
//! [`Settlement::Reject`], an executor by returning `Err`. A rejection that
//! reaches a deferred nobody listens to is reported as an
//! [`UncaughtRejection`] through [`Runtime::on_uncaught_rejection`].
//!
//! ```
//! use deferred::{Deferred, Runtime, Settlement};
//!
//! let (rt, queue) = Runtime::local();
//! let inner = Deferred::<i32, String>::resolve(&rt, 5);
//! let outer = Deferred::<i32, String>::from_settlement(&rt, Settlement::adopt(inner))
//!     .then(|v| Settlement::Fulfill(v * 2));
//!
//! // Nothing happens until the queue is driven.
//! assert!(outer.settled().is_none());
//! queue.run_until_idle();
//! assert_eq!(outer.settled(), Some(Ok(10)));
//! ```
mod combinators;
mod deferred;
mod error;
mod reaction;
mod reporter;
mod runtime;
mod scheduler;
mod settlement;
mod waiter;

pub use deferred::{Deferred, Rejecter, Resolver};
pub use error::Error;
pub use reporter::UncaughtRejection;
pub use runtime::{Runtime, RuntimeConfig, UncaughtPolicy};
pub use scheduler::{MicrotaskQueue, Scheduler, Task};
pub use settlement::{Settlement, State, Thenable};
pub use waiter::Waiter;
