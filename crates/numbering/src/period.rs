use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::ResetCadence;

/// Identifies which counter generation is active for a policy.
///
/// Derived from the reset cadence: "" (never resets), "2025" (yearly) or
/// "2025-03" (monthly). Counter values may repeat across periods; the
/// embedded period token keeps the formatted numbers distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn for_cadence(cadence: ResetCadence, at: DateTime<Utc>) -> Self {
        match cadence {
            ResetCadence::Never => Self(String::new()),
            ResetCadence::Yearly => Self(format!("{:04}", at.year())),
            ResetCadence::Monthly => Self(format!("{:04}-{:02}", at.year(), at.month())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for PeriodKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn march_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn cadence_derives_expected_keys() {
        assert_eq!(
            PeriodKey::for_cadence(ResetCadence::Never, march_2025()).as_str(),
            ""
        );
        assert_eq!(
            PeriodKey::for_cadence(ResetCadence::Yearly, march_2025()).as_str(),
            "2025"
        );
        assert_eq!(
            PeriodKey::for_cadence(ResetCadence::Monthly, march_2025()).as_str(),
            "2025-03"
        );
    }

    #[test]
    fn year_boundary_changes_yearly_key() {
        let dec = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let jan = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_ne!(
            PeriodKey::for_cadence(ResetCadence::Yearly, dec),
            PeriodKey::for_cadence(ResetCadence::Yearly, jan)
        );
    }
}
