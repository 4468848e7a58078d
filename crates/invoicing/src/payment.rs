use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use kontor_core::{AggregateId, Money, OrganizationId};

use crate::invoice::InvoiceId;

/// Payment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How the payment was settled.
///
/// `Reversal` is the only method allowed to carry a negative amount; a
/// correction is always a new payment record, never an edit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Transfer,
    Card,
    Cheque,
    Cash,
    Reversal,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Reversal => "reversal",
        }
    }
}

impl core::str::FromStr for PaymentMethod {
    type Err = kontor_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(PaymentMethod::Transfer),
            "card" => Ok(PaymentMethod::Card),
            "cheque" => Ok(PaymentMethod::Cheque),
            "cash" => Ok(PaymentMethod::Cash),
            "reversal" => Ok(PaymentMethod::Reversal),
            other => Err(kontor_core::DomainError::validation(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}

/// Immutable payment record.
///
/// References its invoice by id only; it is owned by the ledger's transaction
/// boundary (persisted atomically with the invoice state it changed), not by
/// an in-memory parent-child link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
}
