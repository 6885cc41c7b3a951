pub use crate::config::IdempotencyConfig;
pub use crate::coordinator::{IdempotencyCoordinator, Outcome};
pub use crate::key_extractor::KeyExtractor;
use store::StoreError;
use thiserror::Error;

pub mod config;
pub mod coordinator;
pub mod key_extractor;

/// Errors raised by the coordination layer itself.
/// Business-logic failures are not errors here; they surface as
/// `Outcome::Failure` so the handler can translate them.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The request cannot be deduplicated. Nothing was written to the store
    /// and no business logic ran.
    #[error("could not resolve idempotency key at `{path}`: {reason}")]
    KeyResolution { path: String, reason: String },

    /// The store could not uphold the claim protocol. The invocation fails
    /// closed rather than risking a duplicate execution.
    #[error(transparent)]
    Store(#[from] StoreError),
}
