//! Application service for the invoice ledger.
//!
//! Creation consumes a generated document number; all other operations run
//! the load → handle → commit → publish pipeline against the invoice store.
//! Payment posting is delegated to [`PaymentPoster`], the only writer of
//! payment records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use kontor_core::{Aggregate, AggregateId, DomainError, Money, OrganizationId, Rounding};
use kontor_events::{EventBus, EventEnvelope};
use kontor_invoicing::{
    ApplyPayment, CancelInvoice, ClientId, CreateInvoice, FinalizeInvoice, Invoice, InvoiceCommand,
    InvoiceId, InvoiceSnapshot, Payment, PlanInstallments,
};
use kontor_numbering::DocumentType;

use crate::error::ServiceError;
use crate::invoice_store::InvoiceStore;
use crate::number_generator::NumberGenerator;
use crate::payment_poster::{PaymentPoster, publish_events};
use crate::policy_store::PolicyStore;
use crate::retry::RetryPolicy;
use crate::sequence_store::SequenceStore;

pub struct InvoiceLedgerService<S, B, Q, P> {
    store: S,
    bus: B,
    poster: PaymentPoster<S, B>,
    numbers: Arc<NumberGenerator<Q, P>>,
    retry: RetryPolicy,
}

impl<S, B, Q, P> InvoiceLedgerService<S, B, Q, P>
where
    S: InvoiceStore + Clone,
    B: EventBus<EventEnvelope<JsonValue>> + Clone,
    Q: SequenceStore,
    P: PolicyStore,
{
    pub fn new(store: S, bus: B, numbers: Arc<NumberGenerator<Q, P>>) -> Self {
        let poster = PaymentPoster::new(store.clone(), bus.clone());
        Self {
            store,
            bus,
            poster,
            numbers,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a draft invoice, consuming the next invoice number.
    ///
    /// The number is reserved before the row insert; if the insert fails the
    /// number stays burned (gap, never a duplicate).
    pub fn create_invoice(
        &self,
        organization_id: OrganizationId,
        client_id: ClientId,
        total: Money,
        rounding: Rounding,
        now: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        let number = self
            .numbers
            .allocate(organization_id, DocumentType::Invoice, now)?;
        let invoice_id = InvoiceId::new(AggregateId::new());

        let mut invoice = Invoice::empty(invoice_id);
        let events = invoice
            .handle(&InvoiceCommand::CreateInvoice(CreateInvoice {
                organization_id,
                invoice_id,
                number: number.clone(),
                client_id,
                total,
                rounding,
                occurred_at: now,
            }))
            .map_err(ServiceError::Domain)?;
        for event in &events {
            invoice.apply(event);
        }

        let snapshot = invoice.snapshot().map_err(ServiceError::Domain)?;
        self.store.insert(&snapshot)?;

        info!(
            organization_id = %organization_id.as_uuid(),
            invoice_id = %invoice_id,
            number = %number,
            "invoice created"
        );

        publish_events(&self.bus, 0, &invoice, &events)?;
        Ok(snapshot)
    }

    pub fn get(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        self.store
            .load(organization_id, invoice_id)?
            .ok_or(ServiceError::Domain(DomainError::NotFound))
    }

    pub fn payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, ServiceError> {
        Ok(self.store.payments(organization_id, invoice_id)?)
    }

    pub fn finalize(&self, command: FinalizeInvoice) -> Result<InvoiceSnapshot, ServiceError> {
        self.execute(
            command.organization_id,
            command.invoice_id,
            InvoiceCommand::FinalizeInvoice(command),
        )
    }

    pub fn cancel(&self, command: CancelInvoice) -> Result<InvoiceSnapshot, ServiceError> {
        self.execute(
            command.organization_id,
            command.invoice_id,
            InvoiceCommand::CancelInvoice(command),
        )
    }

    pub fn plan_installments(
        &self,
        command: PlanInstallments,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        self.execute(
            command.organization_id,
            command.invoice_id,
            InvoiceCommand::PlanInstallments(command),
        )
    }

    pub fn apply_payment(&self, command: &ApplyPayment) -> Result<InvoiceSnapshot, ServiceError> {
        self.poster.post(command)
    }

    /// Shared pipeline for non-payment state transitions.
    fn execute(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        command: InvoiceCommand,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        self.retry.run(
            || {
                let stored = self
                    .store
                    .load(organization_id, invoice_id)?
                    .ok_or(ServiceError::Domain(DomainError::NotFound))?;

                let expected_version = stored.version;
                let mut invoice = Invoice::from_snapshot(stored);

                let events = invoice.handle(&command).map_err(ServiceError::Domain)?;
                for event in &events {
                    invoice.apply(event);
                }

                let snapshot = invoice.snapshot().map_err(ServiceError::Domain)?;
                self.store.commit(expected_version, &snapshot)?;

                publish_events(&self.bus, expected_version, &invoice, &events)?;
                Ok(snapshot)
            },
            ServiceError::is_transient,
        )
    }
}
