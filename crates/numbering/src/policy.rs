use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kontor_core::{DomainError, DomainResult, OrganizationId};

use crate::period::PeriodKey;

/// Kind of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    PurchaseOrder,
    CreditNote,
    Quote,
    DeliveryNote,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::PurchaseOrder => "purchase_order",
            DocumentType::CreditNote => "credit_note",
            DocumentType::Quote => "quote",
            DocumentType::DeliveryNote => "delivery_note",
        }
    }

    /// Conventional prefix used when an organization has not configured one.
    pub fn default_prefix(self) -> &'static str {
        match self {
            DocumentType::Invoice => "FA",
            DocumentType::PurchaseOrder => "BC",
            DocumentType::CreditNote => "AV",
            DocumentType::Quote => "DV",
            DocumentType::DeliveryNote => "BL",
        }
    }
}

impl core::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DocumentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(DocumentType::Invoice),
            "purchase_order" => Ok(DocumentType::PurchaseOrder),
            "credit_note" => Ok(DocumentType::CreditNote),
            "quote" => Ok(DocumentType::Quote),
            "delivery_note" => Ok(DocumentType::DeliveryNote),
            other => Err(DomainError::validation(format!(
                "unknown document type '{other}'"
            ))),
        }
    }
}

/// How often the counter restarts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCadence {
    Never,
    Yearly,
    Monthly,
}

/// Numbering policy: pure data, no behavior beyond validation and formatting.
///
/// One policy per (organization, document type). Counters themselves are
/// durable rows keyed by (organization, document type, period key) and are
/// owned by the sequence store, not by the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingPolicy {
    pub organization_id: OrganizationId,
    pub document_type: DocumentType,
    pub prefix: String,
    pub suffix: String,
    pub separator: String,
    /// Zero-pad width for the counter segment. Counter values that outgrow it
    /// widen the segment unless `widen_on_overflow` is false.
    pub digit_width: u32,
    /// Optional chrono format token (e.g. "%Y%m") rendered from the
    /// allocation timestamp in place of the period key. Must encode the
    /// reset period (see [`NumberingPolicy::validate`]); when absent, the
    /// period key itself is embedded so numbers from different periods can
    /// never collide.
    pub date_format_token: Option<String>,
    pub reset_cadence: ResetCadence,
    pub widen_on_overflow: bool,
    pub active: bool,
}

impl NumberingPolicy {
    /// Sensible defaults for an organization that has not configured numbering:
    /// "FA-2025-00001" style, yearly reset, widening allowed.
    pub fn default_for(organization_id: OrganizationId, document_type: DocumentType) -> Self {
        Self {
            organization_id,
            document_type,
            prefix: document_type.default_prefix().to_string(),
            suffix: String::new(),
            separator: "-".to_string(),
            digit_width: 5,
            date_format_token: None,
            reset_cadence: ResetCadence::Yearly,
            widen_on_overflow: true,
            active: true,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.digit_width < 1 {
            return Err(DomainError::validation("digit_width must be at least 1"));
        }
        // i64 counters cap at 19 digits; a wider pad can never be filled.
        if self.digit_width > 18 {
            return Err(DomainError::validation("digit_width must be at most 18"));
        }
        if let Some(token) = &self.date_format_token {
            if token.trim().is_empty() {
                return Err(DomainError::validation(
                    "date_format_token must not be blank when set",
                ));
            }
            // The rendered token replaces the period segment, so it must
            // distinguish the periods the counter resets over; otherwise two
            // allocations in different periods could render the same number.
            let has_year = token.contains("%Y") || token.contains("%y");
            let has_month = token.contains("%m") || token.contains("%b") || token.contains("%B");
            match self.reset_cadence {
                ResetCadence::Never => {}
                ResetCadence::Yearly if !has_year => {
                    return Err(DomainError::validation(
                        "date_format_token must include %Y or %y for a yearly reset",
                    ));
                }
                ResetCadence::Monthly if !(has_year && has_month) => {
                    return Err(DomainError::validation(
                        "date_format_token must include a year and a month specifier for a monthly reset",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Period key the counter lives under for an allocation at `now`.
    pub fn period_key(&self, now: DateTime<Utc>) -> PeriodKey {
        PeriodKey::for_cadence(self.reset_cadence, now)
    }
}
