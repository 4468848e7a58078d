//! Durable per-(organization, document type, period) counters.

mod in_memory;
mod postgres;

use std::sync::Arc;

use kontor_core::OrganizationId;
use kontor_numbering::{DocumentType, PeriodKey};

use crate::error::StoreError;

pub use in_memory::InMemorySequenceStore;
pub use postgres::PostgresSequenceStore;

/// Key of one counter row. A fresh key starts at zero implicitly, so a new
/// period begins numbering at 1 without any provisioning step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    pub organization_id: OrganizationId,
    pub document_type: DocumentType,
    pub period_key: PeriodKey,
}

/// Strictly increasing counter storage.
///
/// `reserve_next` is a single atomic increment-and-return: two concurrent
/// callers can never observe the same value. Reserved values are never
/// returned to the pool, so crashes and formatting failures leave gaps,
/// never duplicates. Counter rows are never deleted; prior periods stay
/// readable for gap audits.
pub trait SequenceStore: Send + Sync {
    fn reserve_next(&self, key: &SequenceKey) -> Result<i64, StoreError>;

    /// Current high-water mark for a counter, `None` when the period has not
    /// allocated yet. Read-only; never advances the counter.
    fn current_value(&self, key: &SequenceKey) -> Result<Option<i64>, StoreError>;
}

impl<S> SequenceStore for Arc<S>
where
    S: SequenceStore + ?Sized,
{
    fn reserve_next(&self, key: &SequenceKey) -> Result<i64, StoreError> {
        (**self).reserve_next(key)
    }

    fn current_value(&self, key: &SequenceKey) -> Result<Option<i64>, StoreError> {
        (**self).current_value(key)
    }
}
