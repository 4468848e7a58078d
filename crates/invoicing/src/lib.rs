//! Invoice ledger: payment reconciliation state machine, installment
//! planning (échéances) and early-payment discount (escompte) rules.

pub mod invoice;
pub mod payment;
pub mod schedule;

pub use invoice::{
    ApplyPayment, CancelInvoice, ClientId, CreateInvoice, FinalizeInvoice, Invoice, InvoiceCommand,
    InvoiceCreated, InvoiceEvent, InvoiceId, InvoiceSnapshot, InvoiceStatus, PaymentApplied,
    PlanInstallments,
};
pub use payment::{Payment, PaymentId, PaymentMethod};
pub use schedule::{Installment, InstallmentSchedule, InstallmentStatus, plan_installments};
