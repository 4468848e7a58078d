//! Infrastructure layer: durable counters, invoice state storage,
//! number generation and payment posting orchestration.

pub mod error;
pub mod invoice_store;
pub mod ledger_service;
pub mod number_generator;
pub mod payment_poster;
pub mod policy_store;
pub mod retry;
pub mod sequence_store;

mod pg;

pub use error::{ServiceError, StoreError};
pub use invoice_store::{InMemoryInvoiceStore, InvoiceStore, PostgresInvoiceStore};
pub use ledger_service::InvoiceLedgerService;
pub use number_generator::NumberGenerator;
pub use payment_poster::PaymentPoster;
pub use policy_store::{InMemoryPolicyStore, PolicyStore, PostgresPolicyStore};
pub use retry::RetryPolicy;
pub use sequence_store::{InMemorySequenceStore, PostgresSequenceStore, SequenceStore};
