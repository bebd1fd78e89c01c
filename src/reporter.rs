//! Last-chance reporting for rejections nobody handles.
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use thiserror::Error;

use crate::error::Error as DeferredError;
use crate::runtime::UncaughtPolicy;

pub(crate) type Hook = Rc<dyn Fn(&UncaughtRejection)>;

/// The reason of a rejected deferred that drained without a failure handler.
#[derive(Error, Debug, Clone)]
#[error("uncaught rejection (in deferred): {description}")]
pub struct UncaughtRejection {
    reason: Rc<dyn Any>,
    description: String,
}

impl UncaughtRejection {
    pub(crate) fn new<E: Debug + 'static>(reason: E) -> Self {
        Self {
            description: format!("{reason:?}"),
            reason: Rc::new(reason),
        }
    }

    /// The original reason, if it was an `E`.
    pub fn reason<E: 'static>(&self) -> Option<&E> {
        self.reason.downcast_ref::<E>()
    }

    /// `Debug` rendering of the reason.
    pub fn description(&self) -> &str {
        &self.description
    }
}

pub(crate) struct Reporter {
    policy: UncaughtPolicy,
    hooks: RefCell<Vec<Hook>>,
    reported: Cell<usize>,
}

impl Reporter {
    pub(crate) fn new(policy: UncaughtPolicy) -> Self {
        Self {
            policy,
            hooks: RefCell::new(Vec::new()),
            reported: Cell::new(0),
        }
    }

    pub(crate) fn add_hook(&self, hook: Hook) {
        self.hooks.borrow_mut().push(hook);
    }

    pub(crate) fn count(&self) -> usize {
        self.reported.get()
    }

    pub(crate) fn report(&self, rejection: UncaughtRejection) {
        self.reported.set(self.reported.get() + 1);
        tracing::error!(reason = %rejection.description(), "{rejection}");

        // A hook may register further hooks.
        let hooks = self.hooks.borrow().clone();
        for hook in hooks {
            hook(&rejection);
        }

        if self.policy == UncaughtPolicy::Panic {
            panic!("{}", DeferredError::from(rejection));
        }
    }
}
