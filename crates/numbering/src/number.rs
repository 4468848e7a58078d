use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kontor_core::{DomainError, DomainResult};

use crate::period::PeriodKey;
use crate::policy::NumberingPolicy;

/// A formatted, human-readable document number.
///
/// Immutable value: `prefix + sep + [date token] + sep + zero-padded counter
/// + suffix`. Two numbers produced for the same (organization, document type,
/// period) are never equal because the counter segment is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedNumber(String);

impl GeneratedNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for GeneratedNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<GeneratedNumber> for String {
    fn from(value: GeneratedNumber) -> Self {
        value.0
    }
}

impl NumberingPolicy {
    /// Format a reserved counter value into the final document number.
    ///
    /// Deterministic: same policy + timestamp + value always renders the same
    /// string. Values wider than `digit_width` widen the counter segment, or
    /// fail with `FormatOverflow` when the policy forbids widening. Counter
    /// values are never wrapped or truncated.
    pub fn format_number(
        &self,
        now: DateTime<Utc>,
        period: &PeriodKey,
        value: i64,
    ) -> DomainResult<GeneratedNumber> {
        if value < 1 {
            return Err(DomainError::validation(format!(
                "counter value must be positive, got {value}"
            )));
        }

        let digits = value.to_string();
        if digits.len() as u32 > self.digit_width && !self.widen_on_overflow {
            return Err(DomainError::format_overflow(format!(
                "counter value {value} exceeds digit width {} for {} policy",
                self.digit_width, self.document_type
            )));
        }

        let date_segment = match &self.date_format_token {
            Some(token) => now.format(token).to_string(),
            None => period.as_str().to_string(),
        };

        let mut segments: Vec<&str> = Vec::with_capacity(3);
        if !self.prefix.is_empty() {
            segments.push(&self.prefix);
        }
        if !date_segment.is_empty() {
            segments.push(&date_segment);
        }
        let padded = format!("{digits:0>width$}", width = self.digit_width as usize);
        segments.push(&padded);

        let mut text = segments.join(&self.separator);
        text.push_str(&self.suffix);
        Ok(GeneratedNumber(text))
    }
}
