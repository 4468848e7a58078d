use std::collections::HashMap;
use std::sync::RwLock;

use kontor_core::{ExpectedVersion, OrganizationId};
use kontor_invoicing::{InvoiceId, InvoiceSnapshot, Payment};

use crate::error::StoreError;

use super::InvoiceStore;

#[derive(Debug, Clone)]
struct InvoiceRow {
    snapshot: InvoiceSnapshot,
    payments: Vec<Payment>,
}

/// In-memory invoice store for tests/dev.
///
/// The write lock makes the version check and the state+payment write a
/// single atomic step, same as the Postgres transaction.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    rows: RwLock<HashMap<(OrganizationId, InvoiceId), InvoiceRow>>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_payment_scope(
        snapshot: &InvoiceSnapshot,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        if payment.organization_id != snapshot.organization_id {
            return Err(StoreError::OrganizationIsolation(
                "payment organization differs from invoice organization".to_string(),
            ));
        }
        if payment.invoice_id != snapshot.id {
            return Err(StoreError::OrganizationIsolation(
                "payment invoice_id differs from the committed invoice".to_string(),
            ));
        }
        Ok(())
    }
}

impl InvoiceStore for InMemoryInvoiceStore {
    fn insert(&self, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("invoice lock poisoned".to_string()))?;

        let key = (snapshot.organization_id, snapshot.id);
        if rows.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "invoice {} already stored",
                snapshot.id
            )));
        }

        rows.insert(
            key,
            InvoiceRow {
                snapshot: snapshot.clone(),
                payments: Vec::new(),
            },
        );
        Ok(())
    }

    fn load(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("invoice lock poisoned".to_string()))?;

        Ok(rows
            .get(&(organization_id, invoice_id))
            .map(|row| row.snapshot.clone()))
    }

    fn commit(&self, expected_version: u64, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("invoice lock poisoned".to_string()))?;

        let row = rows
            .get_mut(&(snapshot.organization_id, snapshot.id))
            .ok_or_else(|| StoreError::Conflict("invoice row missing".to_string()))?;

        if !ExpectedVersion::Exact(expected_version).matches(row.snapshot.version) {
            return Err(StoreError::Conflict(format!(
                "expected version {expected_version}, found {}",
                row.snapshot.version
            )));
        }

        row.snapshot = snapshot.clone();
        Ok(())
    }

    fn commit_payment(
        &self,
        expected_version: u64,
        snapshot: &InvoiceSnapshot,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        Self::check_payment_scope(snapshot, payment)?;

        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("invoice lock poisoned".to_string()))?;

        let row = rows
            .get_mut(&(snapshot.organization_id, snapshot.id))
            .ok_or_else(|| StoreError::Conflict("invoice row missing".to_string()))?;

        if !ExpectedVersion::Exact(expected_version).matches(row.snapshot.version) {
            return Err(StoreError::Conflict(format!(
                "expected version {expected_version}, found {}",
                row.snapshot.version
            )));
        }

        row.snapshot = snapshot.clone();
        row.payments.push(payment.clone());
        Ok(())
    }

    fn payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("invoice lock poisoned".to_string()))?;

        Ok(rows
            .get(&(organization_id, invoice_id))
            .map(|row| row.payments.clone())
            .unwrap_or_default())
    }
}
