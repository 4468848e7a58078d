//! Postgres-backed invoice store.
//!
//! ```sql
//! CREATE TABLE invoices (
//!     organization_id UUID   NOT NULL,
//!     invoice_id      UUID   NOT NULL,
//!     state           JSONB  NOT NULL,
//!     version         BIGINT NOT NULL CHECK (version > 0),
//!     PRIMARY KEY (organization_id, invoice_id)
//! );
//!
//! CREATE TABLE payments (
//!     payment_id      UUID    NOT NULL PRIMARY KEY,
//!     organization_id UUID    NOT NULL,
//!     invoice_id      UUID    NOT NULL,
//!     amount          NUMERIC NOT NULL,
//!     paid_on         DATE    NOT NULL,
//!     method          TEXT    NOT NULL,
//!     recorded_at     TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! Optimistic locking is a conditional update (`WHERE version = $expected`);
//! zero affected rows means another writer committed first. Payment rows are
//! inserted in the same transaction as the state update, so the balance and
//! the payment record can never diverge.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;

use kontor_core::{Money, OrganizationId};
use kontor_invoicing::{InvoiceId, InvoiceSnapshot, Payment, PaymentId};

use crate::error::StoreError;
use crate::pg::{block_on_runtime, map_sqlx_error};

use super::InvoiceStore;

#[derive(Debug, Clone)]
pub struct PostgresInvoiceStore {
    pool: Arc<PgPool>,
}

impl PostgresInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(
        skip(self, snapshot),
        fields(
            organization_id = %snapshot.organization_id.as_uuid(),
            invoice_id = %snapshot.id
        ),
        err
    )]
    pub async fn insert_async(&self, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        let state = encode_state(snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO invoices (organization_id, invoice_id, state, version)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(snapshot.organization_id.as_uuid())
        .bind(snapshot.id.0.as_uuid())
        .bind(state)
        .bind(snapshot.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_invoice", e) {
            StoreError::Conflict(msg) => StoreError::AlreadyExists(msg),
            other => other,
        })?;

        Ok(())
    }

    pub async fn load_async(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT state
            FROM invoices
            WHERE organization_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(invoice_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_invoice", e))?;

        row.map(|r| {
            let state: serde_json::Value = r
                .try_get("state")
                .map_err(|e| StoreError::Serialization(format!("invoice row: {e}")))?;
            decode_state(state)
        })
        .transpose()
    }

    #[instrument(
        skip(self, snapshot),
        fields(
            organization_id = %snapshot.organization_id.as_uuid(),
            invoice_id = %snapshot.id,
            expected_version
        ),
        err
    )]
    pub async fn commit_async(
        &self,
        expected_version: u64,
        snapshot: &InvoiceSnapshot,
    ) -> Result<(), StoreError> {
        let state = encode_state(snapshot)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET state = $3, version = $4
            WHERE organization_id = $1 AND invoice_id = $2 AND version = $5
            "#,
        )
        .bind(snapshot.organization_id.as_uuid())
        .bind(snapshot.id.0.as_uuid())
        .bind(state)
        .bind(snapshot.version as i64)
        .bind(expected_version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("commit_invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "invoice {} changed since version {expected_version}",
                snapshot.id
            )));
        }

        Ok(())
    }

    #[instrument(
        skip(self, snapshot, payment),
        fields(
            organization_id = %snapshot.organization_id.as_uuid(),
            invoice_id = %snapshot.id,
            payment_id = %payment.id.0,
            expected_version
        ),
        err
    )]
    pub async fn commit_payment_async(
        &self,
        expected_version: u64,
        snapshot: &InvoiceSnapshot,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        if payment.organization_id != snapshot.organization_id
            || payment.invoice_id != snapshot.id
        {
            return Err(StoreError::OrganizationIsolation(
                "payment scope differs from the committed invoice".to_string(),
            ));
        }

        let state = encode_state(snapshot)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET state = $3, version = $4
            WHERE organization_id = $1 AND invoice_id = $2 AND version = $5
            "#,
        )
        .bind(snapshot.organization_id.as_uuid())
        .bind(snapshot.id.0.as_uuid())
        .bind(state)
        .bind(snapshot.version as i64)
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_invoice", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Conflict(format!(
                "invoice {} changed since version {expected_version}",
                snapshot.id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, organization_id, invoice_id, amount, paid_on, method)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id.0.as_uuid())
        .bind(payment.organization_id.as_uuid())
        .bind(payment.invoice_id.0.as_uuid())
        .bind(payment.amount.amount())
        .bind(payment.date)
        .bind(payment.method.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(())
    }

    pub async fn payments_async(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT payment_id, organization_id, invoice_id, amount, paid_on, method
            FROM payments
            WHERE organization_id = $1 AND invoice_id = $2
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(invoice_id.0.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_payments", e))?;

        rows.into_iter().map(payment_from_row).collect()
    }
}

fn encode_state(snapshot: &InvoiceSnapshot) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(snapshot)
        .map_err(|e| StoreError::Serialization(format!("invoice state: {e}")))
}

fn decode_state(value: serde_json::Value) -> Result<InvoiceSnapshot, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Serialization(format!("invoice state: {e}")))
}

fn payment_from_row(row: sqlx::postgres::PgRow) -> Result<Payment, StoreError> {
    let read = |e: sqlx::Error| StoreError::Serialization(format!("payment row: {e}"));

    let method: String = row.try_get("method").map_err(read)?;
    Ok(Payment {
        id: PaymentId::new(kontor_core::AggregateId::from_uuid(
            row.try_get("payment_id").map_err(read)?,
        )),
        organization_id: OrganizationId::from_uuid(
            row.try_get("organization_id").map_err(read)?,
        ),
        invoice_id: InvoiceId::new(kontor_core::AggregateId::from_uuid(
            row.try_get("invoice_id").map_err(read)?,
        )),
        amount: Money::new(row.try_get("amount").map_err(read)?),
        date: row.try_get("paid_on").map_err(read)?,
        method: method
            .parse()
            .map_err(|e| StoreError::Serialization(format!("payment method: {e:?}")))?,
    })
}

impl InvoiceStore for PostgresInvoiceStore {
    fn insert(&self, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        block_on_runtime(self.insert_async(snapshot))
    }

    fn load(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        block_on_runtime(self.load_async(organization_id, invoice_id))
    }

    fn commit(&self, expected_version: u64, snapshot: &InvoiceSnapshot) -> Result<(), StoreError> {
        block_on_runtime(self.commit_async(expected_version, snapshot))
    }

    fn commit_payment(
        &self,
        expected_version: u64,
        snapshot: &InvoiceSnapshot,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        block_on_runtime(self.commit_payment_async(expected_version, snapshot, payment))
    }

    fn payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        block_on_runtime(self.payments_async(organization_id, invoice_id))
    }
}
