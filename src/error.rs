use thiserror::Error;

use crate::reporter::UncaughtRejection;

/// Diagnostics raised by the runtime itself, outside any deferred chain.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A rejected deferred drained with nobody listening for the reason.
    #[error(transparent)]
    UncaughtRejection(#[from] UncaughtRejection),

    /// A deferred kept being resolved with thenables past the configured cap.
    #[error("adoption depth limit of {limit} exceeded, deferred left pending")]
    AdoptionDepthExceeded { limit: usize },

    /// The last resolver and rejecter of a pending deferred were dropped with
    /// no settlement queued, so it can never settle.
    #[error("every resolver was dropped before the deferred settled")]
    Abandoned,
}
