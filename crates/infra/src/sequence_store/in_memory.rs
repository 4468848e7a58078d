use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

use super::{SequenceKey, SequenceStore};

/// In-memory counter store.
///
/// Intended for tests/dev. The mutex makes increment-and-return atomic;
/// counters are kept for the process lifetime and never deleted.
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    counters: Mutex<HashMap<SequenceKey, i64>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn reserve_next(&self, key: &SequenceKey) -> Result<i64, StoreError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Backend("sequence lock poisoned".to_string()))?;

        let value = counters.entry(key.clone()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn current_value(&self, key: &SequenceKey) -> Result<Option<i64>, StoreError> {
        let counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Backend("sequence lock poisoned".to_string()))?;

        Ok(counters.get(key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontor_core::OrganizationId;
    use kontor_numbering::{DocumentType, PeriodKey, ResetCadence};

    fn key(org: OrganizationId, period: &str) -> SequenceKey {
        SequenceKey {
            organization_id: org,
            document_type: DocumentType::Invoice,
            period_key: PeriodKey::from(period.to_string()),
        }
    }

    #[test]
    fn counters_start_at_one_and_increase() {
        let store = InMemorySequenceStore::new();
        let org = OrganizationId::new();
        let k = key(org, "2025");

        assert_eq!(store.current_value(&k).unwrap(), None);
        assert_eq!(store.reserve_next(&k).unwrap(), 1);
        assert_eq!(store.reserve_next(&k).unwrap(), 2);
        assert_eq!(store.current_value(&k).unwrap(), Some(2));
    }

    #[test]
    fn counters_are_isolated_per_key() {
        let store = InMemorySequenceStore::new();
        let org_a = OrganizationId::new();
        let org_b = OrganizationId::new();

        assert_eq!(store.reserve_next(&key(org_a, "2025")).unwrap(), 1);
        assert_eq!(store.reserve_next(&key(org_b, "2025")).unwrap(), 1);
        assert_eq!(store.reserve_next(&key(org_a, "2026")).unwrap(), 1);
        assert_eq!(store.reserve_next(&key(org_a, "2025")).unwrap(), 2);

        // prior-period counters stay readable after a reset boundary
        assert_eq!(store.current_value(&key(org_a, "2025")).unwrap(), Some(2));
    }

    #[test]
    fn period_key_cadences_produce_distinct_keys() {
        let store = InMemorySequenceStore::new();
        let org = OrganizationId::new();
        let now = chrono::Utc::now();

        let yearly = SequenceKey {
            organization_id: org,
            document_type: DocumentType::Invoice,
            period_key: PeriodKey::for_cadence(ResetCadence::Yearly, now),
        };
        let never = SequenceKey {
            organization_id: org,
            document_type: DocumentType::Invoice,
            period_key: PeriodKey::for_cadence(ResetCadence::Never, now),
        };

        assert_eq!(store.reserve_next(&yearly).unwrap(), 1);
        assert_eq!(store.reserve_next(&never).unwrap(), 1);
    }
}
