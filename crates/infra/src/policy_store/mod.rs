//! Numbering policy storage (one policy per organization + document type).

mod in_memory;
mod postgres;

use std::sync::Arc;

use kontor_core::OrganizationId;
use kontor_numbering::{DocumentType, NumberingPolicy};

use crate::error::StoreError;

pub use in_memory::InMemoryPolicyStore;
pub use postgres::PostgresPolicyStore;

/// Policy lookups and configuration writes.
///
/// Lookup misses are not errors; the number generator falls back to
/// `NumberingPolicy::default_for` when an organization has not configured
/// numbering for a document type.
pub trait PolicyStore: Send + Sync {
    fn get(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<Option<NumberingPolicy>, StoreError>;

    fn upsert(&self, policy: NumberingPolicy) -> Result<(), StoreError>;
}

impl<S> PolicyStore for Arc<S>
where
    S: PolicyStore + ?Sized,
{
    fn get(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<Option<NumberingPolicy>, StoreError> {
        (**self).get(organization_id, document_type)
    }

    fn upsert(&self, policy: NumberingPolicy) -> Result<(), StoreError> {
        (**self).upsert(policy)
    }
}
