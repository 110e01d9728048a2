pub mod clock;
pub mod policy;
pub mod repository;

use berth_shared::{ParseEnumError, Tier};
use uuid::Uuid;

pub use clock::MonotonicClock;
pub use policy::{AgeRules, PoolLayout, TierLimits};
pub use repository::{TicketStore, TierCounts, UnitOfWork};

/// Failures raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The exclusive lock could not be taken within the configured wait.
    #[error("lock wait timed out: {0}")]
    LockTimeout(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<ParseEnumError> for StoreError {
    fn from(err: ParseEnumError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Everything the allocation engine can report back to a caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("No tickets available in any tier")]
    NoCapacity,
    #[error("No berth available for a {tier} ticket")]
    NoBerthAvailable { tier: Tier },
    #[error("Ticket not found: {0}")]
    NotFound(Uuid),
    #[error("Ticket already released: {0}")]
    AlreadyReleased(Uuid),
    #[error("Ticket still admitted: {0}")]
    StillAdmitted(Uuid),
    #[error("Temporarily unavailable, retry later: {0}")]
    TemporarilyUnavailable(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Only lock contention is worth retrying without a change in state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TemporarilyUnavailable(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(msg) => EngineError::TemporarilyUnavailable(msg),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err: EngineError = StoreError::LockTimeout("waited 250ms".into()).into();
        assert!(matches!(err, EngineError::TemporarilyUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_backend_failure_is_internal() {
        let err: EngineError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, EngineError::Internal(_)));
        assert!(!err.is_retryable());
        assert!(!EngineError::NoCapacity.is_retryable());
    }
}
