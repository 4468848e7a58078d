//! Infrastructure wiring for the API.
//!
//! In-memory stores by default (dev/test). With the `postgres` feature and
//! `USE_PERSISTENT_STORES=true`, counters, policies and invoices live in
//! Postgres; the event bus stays in-process either way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use kontor_core::{Money, OrganizationId, Rounding};
use kontor_events::{EventEnvelope, InMemoryEventBus};
use kontor_invoicing::{
    ApplyPayment, CancelInvoice, ClientId, FinalizeInvoice, InvoiceId, InvoiceSnapshot, Payment,
    PlanInstallments,
};
use kontor_numbering::{DocumentType, GeneratedNumber, NumberingPolicy};

use kontor_infra::{
    InMemoryInvoiceStore, InMemoryPolicyStore, InMemorySequenceStore, InvoiceLedgerService,
    NumberGenerator, PolicyStore, ServiceError,
};

#[cfg(feature = "postgres")]
use kontor_infra::{PostgresInvoiceStore, PostgresPolicyStore, PostgresSequenceStore};
#[cfg(feature = "postgres")]
use sqlx::PgPool;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

type InMemoryLedger = InvoiceLedgerService<
    Arc<InMemoryInvoiceStore>,
    Bus,
    Arc<InMemorySequenceStore>,
    Arc<InMemoryPolicyStore>,
>;
type InMemoryNumbers = NumberGenerator<Arc<InMemorySequenceStore>, Arc<InMemoryPolicyStore>>;

#[cfg(feature = "postgres")]
type PersistentLedger = InvoiceLedgerService<
    Arc<PostgresInvoiceStore>,
    Bus,
    Arc<PostgresSequenceStore>,
    Arc<PostgresPolicyStore>,
>;
#[cfg(feature = "postgres")]
type PersistentNumbers = NumberGenerator<Arc<PostgresSequenceStore>, Arc<PostgresPolicyStore>>;

pub enum AppServices {
    InMemory {
        ledger: InMemoryLedger,
        numbers: Arc<InMemoryNumbers>,
        policies: Arc<InMemoryPolicyStore>,
        event_bus: Bus,
    },
    #[cfg(feature = "postgres")]
    Persistent {
        ledger: PersistentLedger,
        numbers: Arc<PersistentNumbers>,
        policies: Arc<PostgresPolicyStore>,
        event_bus: Bus,
    },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
            return build_in_memory_services();
        }
    }

    build_in_memory_services()
}

fn build_in_memory_services() -> AppServices {
    let invoices = Arc::new(InMemoryInvoiceStore::new());
    let sequences = Arc::new(InMemorySequenceStore::new());
    let policies = Arc::new(InMemoryPolicyStore::new());
    let event_bus: Bus = Arc::new(InMemoryEventBus::new());

    let numbers = Arc::new(NumberGenerator::new(sequences, policies.clone()));
    let ledger = InvoiceLedgerService::new(invoices, event_bus.clone(), numbers.clone());

    AppServices::InMemory {
        ledger,
        numbers,
        policies,
        event_bus,
    }
}

#[cfg(feature = "postgres")]
async fn build_persistent_services() -> AppServices {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let invoices = Arc::new(PostgresInvoiceStore::new(pool.clone()));
    let sequences = Arc::new(PostgresSequenceStore::new(pool.clone()));
    let policies = Arc::new(PostgresPolicyStore::new(pool));
    let event_bus: Bus = Arc::new(InMemoryEventBus::new());

    let numbers = Arc::new(NumberGenerator::new(sequences, policies.clone()));
    let ledger = InvoiceLedgerService::new(invoices, event_bus.clone(), numbers.clone());

    AppServices::Persistent {
        ledger,
        numbers,
        policies,
        event_bus,
    }
}

// Delegation over the two wirings; handlers stay backend-agnostic.
impl AppServices {
    pub fn create_invoice(
        &self,
        organization_id: OrganizationId,
        client_id: ClientId,
        total: Money,
        rounding: Rounding,
        now: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => {
                ledger.create_invoice(organization_id, client_id, total, rounding, now)
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => {
                ledger.create_invoice(organization_id, client_id, total, rounding, now)
            }
        }
    }

    pub fn get_invoice(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => ledger.get(organization_id, invoice_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => ledger.get(organization_id, invoice_id),
        }
    }

    pub fn invoice_payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => ledger.payments(organization_id, invoice_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => ledger.payments(organization_id, invoice_id),
        }
    }

    pub fn finalize_invoice(
        &self,
        command: FinalizeInvoice,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => ledger.finalize(command),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => ledger.finalize(command),
        }
    }

    pub fn cancel_invoice(&self, command: CancelInvoice) -> Result<InvoiceSnapshot, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => ledger.cancel(command),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => ledger.cancel(command),
        }
    }

    pub fn plan_installments(
        &self,
        command: PlanInstallments,
    ) -> Result<InvoiceSnapshot, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => ledger.plan_installments(command),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => ledger.plan_installments(command),
        }
    }

    pub fn apply_payment(&self, command: &ApplyPayment) -> Result<InvoiceSnapshot, ServiceError> {
        match self {
            AppServices::InMemory { ledger, .. } => ledger.apply_payment(command),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { ledger, .. } => ledger.apply_payment(command),
        }
    }

    pub fn allocate_number(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Result<GeneratedNumber, ServiceError> {
        match self {
            AppServices::InMemory { numbers, .. } => {
                numbers.allocate(organization_id, document_type, now)
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { numbers, .. } => {
                numbers.allocate(organization_id, document_type, now)
            }
        }
    }

    pub fn current_counter(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, ServiceError> {
        match self {
            AppServices::InMemory { numbers, .. } => {
                numbers.current_value(organization_id, document_type, now)
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { numbers, .. } => {
                numbers.current_value(organization_id, document_type, now)
            }
        }
    }

    pub fn resolve_policy(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<NumberingPolicy, ServiceError> {
        match self {
            AppServices::InMemory { numbers, .. } => {
                numbers.resolve_policy(organization_id, document_type)
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { numbers, .. } => {
                numbers.resolve_policy(organization_id, document_type)
            }
        }
    }

    pub fn upsert_policy(&self, policy: NumberingPolicy) -> Result<(), ServiceError> {
        match self {
            AppServices::InMemory { policies, .. } => Ok(policies.upsert(policy)?),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { policies, .. } => Ok(policies.upsert(policy)?),
        }
    }
}
