use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use kontor_invoicing::{InvoiceSnapshot, Payment};
use kontor_numbering::NumberingPolicy;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client_id: String,
    pub total: Decimal,
    /// Minor-unit decimal places; defaults to 2 (EUR-style).
    pub decimal_places: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyPaymentRequest {
    pub amount: Decimal,
    /// ISO date, e.g. "2025-05-01".
    pub date: chrono::NaiveDate,
    pub method: String,
    pub installment_no: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CancelInvoiceRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlanInstallmentsRequest {
    pub count: u32,
    pub first_due_date: chrono::NaiveDate,
    pub interval_days: u32,
    pub discount_rate: Option<Decimal>,
    pub grace_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AllocateNumberRequest {
    pub document_type: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertPolicyRequest {
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    pub separator: Option<String>,
    pub digit_width: u32,
    pub date_format_token: Option<String>,
    pub reset_cadence: String,
    pub widen_on_overflow: Option<bool>,
    pub active: Option<bool>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn invoice_response(snapshot: &InvoiceSnapshot) -> serde_json::Value {
    json!({
        "id": snapshot.id.to_string(),
        "organization_id": snapshot.organization_id.to_string(),
        "number": snapshot.number.as_str(),
        "client_id": snapshot.client_id.to_string(),
        "total": snapshot.total,
        "remaining": snapshot.remaining,
        "status": snapshot.status.as_str(),
        "schedule": snapshot.schedule,
        "version": snapshot.version,
    })
}

pub fn payment_response(payment: &Payment) -> serde_json::Value {
    json!({
        "id": payment.id.0.to_string(),
        "invoice_id": payment.invoice_id.to_string(),
        "amount": payment.amount,
        "date": payment.date,
        "method": payment.method.as_str(),
    })
}

pub fn policy_response(policy: &NumberingPolicy) -> serde_json::Value {
    serde_json::to_value(policy).unwrap_or_else(|_| json!({}))
}
