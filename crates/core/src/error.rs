//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Infrastructure
/// concerns (connection loss, serialization) belong to the store layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, non-positive amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// Number allocation was attempted against an inactive numbering policy.
    #[error("numbering policy inactive: {0}")]
    PolicyInactive(String),

    /// The reserved counter value does not fit the policy's digit width and
    /// the policy forbids widening.
    #[error("number format overflow: {0}")]
    FormatOverflow(String),

    /// Counter reservation lost the race too many times (retries exhausted).
    #[error("concurrent allocation: {0}")]
    ConcurrentAllocation(String),

    /// A payment would drive the invoice balance below zero.
    #[error("overpayment: {0}")]
    Overpayment(String),

    /// A payment targeted a terminal (paid or cancelled) invoice.
    #[error("invoice closed: {0}")]
    InvoiceClosed(String),

    /// Optimistic-lock conflict: the aggregate changed under the caller.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The installment schedule is immutable once any installment has a
    /// recorded payment.
    #[error("schedule locked: {0}")]
    ScheduleLocked(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn policy_inactive(msg: impl Into<String>) -> Self {
        Self::PolicyInactive(msg.into())
    }

    pub fn format_overflow(msg: impl Into<String>) -> Self {
        Self::FormatOverflow(msg.into())
    }

    pub fn concurrent_allocation(msg: impl Into<String>) -> Self {
        Self::ConcurrentAllocation(msg.into())
    }

    pub fn overpayment(msg: impl Into<String>) -> Self {
        Self::Overpayment(msg.into())
    }

    pub fn invoice_closed(msg: impl Into<String>) -> Self {
        Self::InvoiceClosed(msg.into())
    }

    pub fn concurrent_modification(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn schedule_locked(msg: impl Into<String>) -> Self {
        Self::ScheduleLocked(msg.into())
    }

    /// Transient conflicts may be retried locally with backoff; everything
    /// else is domain-final and surfaced unchanged to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentAllocation(_) | Self::ConcurrentModification(_)
        )
    }
}
