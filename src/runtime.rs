//! The context every [`Deferred`](crate::Deferred) is created in: which
//! scheduler notifications go through, where uncaught rejections are
//! reported, and the knobs controlling both.
use std::fmt;
use std::rc::Rc;

use crate::reporter::{Reporter, UncaughtRejection};
use crate::scheduler::{MicrotaskQueue, Scheduler, Task};

/// What happens after an uncaught rejection has been logged and handed to
/// the registered hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UncaughtPolicy {
    /// Keep running.
    #[default]
    Log,
    /// Panic out of the scheduler turn that found it.
    Panic,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub uncaught_policy: UncaughtPolicy,
    /// How many thenables a single deferred may adopt before it gives up and
    /// stays pending. `None` never gives up.
    pub max_adoption_depth: Option<usize>,
}

impl RuntimeConfig {
    pub fn with_uncaught_policy(mut self, policy: UncaughtPolicy) -> Self {
        self.uncaught_policy = policy;
        self
    }

    pub fn with_max_adoption_depth(mut self, limit: usize) -> Self {
        self.max_adoption_depth = Some(limit);
        self
    }
}

pub struct Runtime {
    scheduler: Rc<dyn Scheduler>,
    reporter: Reporter,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Rc<Self> {
        Self::with_config(scheduler, RuntimeConfig::default())
    }

    pub fn with_config(scheduler: Rc<dyn Scheduler>, config: RuntimeConfig) -> Rc<Self> {
        tracing::debug!(?config, "creating deferred runtime");
        Rc::new(Self {
            scheduler,
            reporter: Reporter::new(config.uncaught_policy),
            config,
        })
    }

    /// A runtime backed by a fresh [`MicrotaskQueue`], returned alongside so
    /// the caller can drive it.
    ///
    /// ```
    /// use deferred::{Deferred, Runtime};
    ///
    /// let (rt, queue) = Runtime::local();
    /// let d = Deferred::<i32, String>::resolve(&rt, 1);
    /// assert!(d.settled().is_none());
    /// queue.run_until_idle();
    /// assert_eq!(d.settled(), Some(Ok(1)));
    /// ```
    pub fn local() -> (Rc<Self>, Rc<MicrotaskQueue>) {
        Self::local_with_config(RuntimeConfig::default())
    }

    pub fn local_with_config(config: RuntimeConfig) -> (Rc<Self>, Rc<MicrotaskQueue>) {
        let queue = MicrotaskQueue::new();
        (Self::with_config(queue.clone(), config), queue)
    }

    /// Register a hook called with every uncaught rejection.
    pub fn on_uncaught_rejection(&self, hook: impl Fn(&UncaughtRejection) + 'static) {
        self.reporter.add_hook(Rc::new(hook));
    }

    /// Number of uncaught rejections reported so far.
    pub fn uncaught_count(&self) -> usize {
        self.reporter.count()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn schedule(&self, task: Task) {
        self.scheduler.schedule(task);
    }

    pub(crate) fn report_uncaught(&self, rejection: UncaughtRejection) {
        self.reporter.report(rejection);
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("uncaught", &self.reporter.count())
            .finish_non_exhaustive()
    }
}
