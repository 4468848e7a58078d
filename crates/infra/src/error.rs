//! Infrastructure error model.
//!
//! Store errors are infrastructure failures (backend, serialization,
//! conflicts at the row level). `ServiceError` is what the orchestration
//! layer surfaces to callers: domain errors pass through unchanged, store
//! conflicts are promoted to `ConcurrentModification` so the API maps them
//! like any other optimistic-lock failure.

use thiserror::Error;

use kontor_core::DomainError;

/// Storage-layer operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Compare-and-swap failed: the stored version differs from the expected one.
    #[error("version conflict: {0}")]
    Conflict(String),

    /// Insert targeted a key that already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A row for a different organization leaked into an organization-scoped
    /// operation.
    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    /// State row (de)serialization failed.
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// Backend failure (pool, connection, poisoned lock).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Error surfaced by the orchestration layer (number generator, payment
/// poster, ledger service).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(StoreError),

    /// Publication failed after a successful commit. The state is already
    /// durable; delivery is at-least-once and consumers must be idempotent.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => {
                ServiceError::Domain(DomainError::concurrent_modification(msg))
            }
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// Whether a local bounded retry may resolve the failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Domain(e) if e.is_transient())
    }
}
