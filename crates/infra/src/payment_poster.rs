//! Payment posting pipeline.
//!
//! The poster is the only writer of payment records. One posting runs:
//!
//! 1. Load the invoice state row (carries its version)
//! 2. Rehydrate the aggregate and run the pure `handle(ApplyPayment)`
//! 3. Apply the decided events locally
//! 4. Commit new state + payment row in one atomic `commit_payment` call,
//!    compare-and-swapped against the loaded version
//! 5. Publish the committed events on the bus
//!
//! A lost CAS means another writer committed between load and commit; the
//! whole pipeline is re-run from the load, up to the retry budget, so each
//! retry decides against the freshest balance. Deterministic rejections
//! (overpayment, closed invoice) surface immediately and leave the stored
//! state untouched.

use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use kontor_core::{Aggregate, AggregateRoot, DomainError};
use kontor_events::{Event, EventBus, EventEnvelope};
use kontor_invoicing::{
    ApplyPayment, Invoice, InvoiceCommand, InvoiceEvent, InvoiceSnapshot, Payment,
};

use crate::error::ServiceError;
use crate::invoice_store::InvoiceStore;
use crate::retry::RetryPolicy;

/// Aggregate type tag carried on published envelopes.
pub const INVOICE_AGGREGATE_TYPE: &str = "invoicing.invoice";

#[derive(Debug)]
pub struct PaymentPoster<S, B> {
    store: S,
    bus: B,
    retry: RetryPolicy,
}

impl<S, B> PaymentPoster<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl<S, B> PaymentPoster<S, B>
where
    S: InvoiceStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Post one payment against an invoice. Returns the committed snapshot.
    pub fn post(&self, command: &ApplyPayment) -> Result<InvoiceSnapshot, ServiceError> {
        self.retry.run(
            || self.post_once(command),
            |e| {
                if e.is_transient() {
                    warn!(
                        invoice_id = %command.invoice_id,
                        payment_id = %command.payment_id.0,
                        "payment posting lost an optimistic-lock race, retrying"
                    );
                    true
                } else {
                    false
                }
            },
        )
    }

    fn post_once(&self, command: &ApplyPayment) -> Result<InvoiceSnapshot, ServiceError> {
        let stored = self
            .store
            .load(command.organization_id, command.invoice_id)?
            .ok_or(ServiceError::Domain(DomainError::NotFound))?;

        let expected_version = stored.version;
        let mut invoice = Invoice::from_snapshot(stored);

        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(command.clone()))
            .map_err(ServiceError::Domain)?;
        for event in &events {
            invoice.apply(event);
        }

        let snapshot = invoice.snapshot().map_err(ServiceError::Domain)?;
        let payment = Payment {
            id: command.payment_id,
            organization_id: command.organization_id,
            invoice_id: command.invoice_id,
            amount: command.amount,
            date: command.date,
            method: command.method,
        };

        self.store
            .commit_payment(expected_version, &snapshot, &payment)?;

        debug!(
            invoice_id = %command.invoice_id,
            payment_id = %command.payment_id.0,
            status = snapshot.status.as_str(),
            remaining = %snapshot.remaining,
            "payment committed"
        );

        publish_events(&self.bus, expected_version, &invoice, &events)?;
        Ok(snapshot)
    }
}

/// Publish committed events as JSON envelopes. Sequence numbers continue from
/// the version the commit was based on, so consumers see commit order.
pub(crate) fn publish_events<B>(
    bus: &B,
    base_version: u64,
    invoice: &Invoice,
    events: &[InvoiceEvent],
) -> Result<(), ServiceError>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    for (idx, event) in events.iter().enumerate() {
        let payload = serde_json::to_value(event)
            .map_err(|e| ServiceError::Publish(format!("payload serialization: {e}")))?;
        let organization_id = invoice
            .organization_id()
            .ok_or_else(|| ServiceError::Publish("invoice has no organization".to_string()))?;

        debug!(event_type = event.event_type(), "publishing event");
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            organization_id,
            invoice.id().0,
            INVOICE_AGGREGATE_TYPE,
            base_version + idx as u64 + 1,
            payload,
        );

        bus.publish(envelope)
            .map_err(|e| ServiceError::Publish(format!("{e:?}")))?;
    }
    Ok(())
}
