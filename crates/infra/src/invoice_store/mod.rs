//! Invoice state rows + append-only payment records.

mod in_memory;
mod postgres;

use std::sync::Arc;

use kontor_core::OrganizationId;
use kontor_invoicing::{InvoiceId, InvoiceSnapshot, Payment};

use crate::error::StoreError;

pub use in_memory::InMemoryInvoiceStore;
pub use postgres::PostgresInvoiceStore;

/// Invoice persistence with optimistic locking.
///
/// Each invoice is one state row carrying an explicit `version`; every write
/// is a compare-and-swap against the version the caller read. Payments are
/// immutable rows appended in the same transaction as the state change that
/// recorded them, so a payment can never exist without its balance effect
/// (and vice versa).
pub trait InvoiceStore: Send + Sync {
    /// Insert a freshly created invoice. Fails with `AlreadyExists` if the
    /// key is taken.
    fn insert(&self, snapshot: &InvoiceSnapshot) -> Result<(), StoreError>;

    fn load(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError>;

    /// Replace the state row iff the stored version equals `expected_version`.
    fn commit(&self, expected_version: u64, snapshot: &InvoiceSnapshot) -> Result<(), StoreError>;

    /// Atomically replace the state row and append a payment record. Neither
    /// is written when the version check fails.
    fn commit_payment(
        &self,
        expected_version: u64,
        snapshot: &InvoiceSnapshot,
        payment: &Payment,
    ) -> Result<(), StoreError>;

    /// All payments recorded against an invoice, in insertion order.
    fn payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError>;
}

impl<S> InvoiceStore for Arc<S>
where
    S: InvoiceStore + ?Sized,
{
    fn insert(&self, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        (**self).insert(snapshot)
    }

    fn load(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        (**self).load(organization_id, invoice_id)
    }

    fn commit(&self, expected_version: u64, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        (**self).commit(expected_version, snapshot)
    }

    fn commit_payment(
        &self,
        expected_version: u64,
        snapshot: &InvoiceSnapshot,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        (**self).commit_payment(expected_version, snapshot, payment)
    }

    fn payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        (**self).payments(organization_id, invoice_id)
    }
}
