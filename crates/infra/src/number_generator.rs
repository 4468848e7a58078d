//! Sequence-backed document number allocation.

use chrono::{DateTime, Utc};
use tracing::debug;

use kontor_core::{DomainError, OrganizationId};
use kontor_numbering::{DocumentType, GeneratedNumber, NumberingPolicy, PeriodKey};

use crate::error::ServiceError;
use crate::policy_store::PolicyStore;
use crate::retry::RetryPolicy;
use crate::sequence_store::{SequenceKey, SequenceStore};

/// Allocates unique, human-readable document numbers.
///
/// Pipeline: resolve the policy (falling back to the organization defaults),
/// reject inactive policies, derive the period key, reserve the next counter
/// value, format. A reserved value is never rolled back: a formatting
/// failure leaves a gap in the sequence, never a duplicate on the documents.
#[derive(Debug)]
pub struct NumberGenerator<S, P> {
    sequences: S,
    policies: P,
    retry: RetryPolicy,
}

impl<S, P> NumberGenerator<S, P>
where
    S: SequenceStore,
    P: PolicyStore,
{
    pub fn new(sequences: S, policies: P) -> Self {
        Self {
            sequences,
            policies,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve the policy for an organization + document type, falling back
    /// to `NumberingPolicy::default_for` when none is configured.
    pub fn resolve_policy(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<NumberingPolicy, ServiceError> {
        Ok(self
            .policies
            .get(organization_id, document_type)?
            .unwrap_or_else(|| NumberingPolicy::default_for(organization_id, document_type)))
    }

    /// Allocate the next number for an organization + document type at `now`.
    pub fn allocate(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Result<GeneratedNumber, ServiceError> {
        let policy = self.resolve_policy(organization_id, document_type)?;
        self.allocate_with(&policy, now)
    }

    /// Allocate under an explicit policy.
    pub fn allocate_with(
        &self,
        policy: &NumberingPolicy,
        now: DateTime<Utc>,
    ) -> Result<GeneratedNumber, ServiceError> {
        if !policy.active {
            return Err(ServiceError::Domain(DomainError::policy_inactive(format!(
                "numbering for {} is deactivated",
                policy.document_type
            ))));
        }
        policy.validate().map_err(ServiceError::Domain)?;

        let period = policy.period_key(now);
        let value = self.reserve(policy, &period)?;
        let number = policy
            .format_number(now, &period, value)
            .map_err(ServiceError::Domain)?;

        debug!(
            organization_id = %policy.organization_id.as_uuid(),
            document_type = %policy.document_type,
            period = %period,
            value,
            number = %number,
            "allocated document number"
        );

        Ok(number)
    }

    /// Current counter high-water mark, for gap audits. `None` when the
    /// period has not allocated yet.
    pub fn current_value(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, ServiceError> {
        let policy = self.resolve_policy(organization_id, document_type)?;
        let key = SequenceKey {
            organization_id,
            document_type,
            period_key: policy.period_key(now),
        };
        Ok(self.sequences.current_value(&key)?)
    }

    fn reserve(
        &self,
        policy: &NumberingPolicy,
        period: &PeriodKey,
    ) -> Result<i64, ServiceError> {
        let key = SequenceKey {
            organization_id: policy.organization_id,
            document_type: policy.document_type,
            period_key: period.clone(),
        };

        self.retry
            .run(
                || self.sequences.reserve_next(&key).map_err(ServiceError::from),
                ServiceError::is_transient,
            )
            .map_err(|e| match e {
                // Retries exhausted on a reservation race.
                ServiceError::Domain(DomainError::ConcurrentModification(msg)) => {
                    ServiceError::Domain(DomainError::concurrent_allocation(msg))
                }
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::policy_store::InMemoryPolicyStore;
    use crate::sequence_store::InMemorySequenceStore;

    fn generator() -> NumberGenerator<InMemorySequenceStore, InMemoryPolicyStore> {
        NumberGenerator::new(InMemorySequenceStore::new(), InMemoryPolicyStore::new())
    }

    fn march(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 10, 0, 0).unwrap()
    }

    #[test]
    fn default_policy_yields_readable_sequential_numbers() {
        let generator = generator();
        let org = OrganizationId::new();

        let first = generator
            .allocate(org, DocumentType::Invoice, march(1))
            .unwrap();
        let second = generator
            .allocate(org, DocumentType::Invoice, march(2))
            .unwrap();

        assert_eq!(first.as_str(), "FA-2025-00001");
        assert_eq!(second.as_str(), "FA-2025-00002");
    }

    #[test]
    fn document_types_run_independent_counters() {
        let generator = generator();
        let org = OrganizationId::new();

        generator
            .allocate(org, DocumentType::Invoice, march(1))
            .unwrap();
        let po = generator
            .allocate(org, DocumentType::PurchaseOrder, march(1))
            .unwrap();

        assert_eq!(po.as_str(), "BC-2025-00001");
    }

    #[test]
    fn yearly_reset_restarts_at_one() {
        let generator = generator();
        let org = OrganizationId::new();

        let dec = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        let jan = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();

        generator.allocate(org, DocumentType::Invoice, dec).unwrap();
        generator.allocate(org, DocumentType::Invoice, dec).unwrap();
        let first_of_year = generator.allocate(org, DocumentType::Invoice, jan).unwrap();

        assert_eq!(first_of_year.as_str(), "FA-2026-00001");
        // the prior period's counter is still readable
        assert_eq!(
            generator
                .current_value(org, DocumentType::Invoice, dec)
                .unwrap(),
            Some(2)
        );
    }

    #[test]
    fn date_token_hiding_the_period_refuses_allocation() {
        // yearly policy with a month-only token: 2025-03 and 2026-03 would
        // both render "FA-03-00001" after the reset
        let sequences = InMemorySequenceStore::new();
        let policies = InMemoryPolicyStore::new();
        let org = OrganizationId::new();

        let mut policy = NumberingPolicy::default_for(org, DocumentType::Invoice);
        policy.date_format_token = Some("%m".to_string());
        crate::policy_store::PolicyStore::upsert(&policies, policy).unwrap();

        let generator = NumberGenerator::new(sequences, policies);
        let err = generator
            .allocate(org, DocumentType::Invoice, march(1))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::Validation(_))
        ));
    }

    #[test]
    fn inactive_policy_refuses_allocation() {
        let sequences = InMemorySequenceStore::new();
        let policies = InMemoryPolicyStore::new();
        let org = OrganizationId::new();

        let mut policy = NumberingPolicy::default_for(org, DocumentType::Invoice);
        policy.active = false;
        crate::policy_store::PolicyStore::upsert(&policies, policy).unwrap();

        let generator = NumberGenerator::new(sequences, policies);
        let err = generator
            .allocate(org, DocumentType::Invoice, march(1))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::PolicyInactive(_))
        ));
    }

    #[test]
    fn overflow_without_widening_fails_but_keeps_the_reservation() {
        let sequences = InMemorySequenceStore::new();
        let policies = InMemoryPolicyStore::new();
        let org = OrganizationId::new();

        let mut policy = NumberingPolicy::default_for(org, DocumentType::Invoice);
        policy.digit_width = 1;
        policy.widen_on_overflow = false;
        crate::policy_store::PolicyStore::upsert(&policies, policy).unwrap();

        let generator = NumberGenerator::new(sequences, policies);
        for _ in 0..9 {
            generator
                .allocate(org, DocumentType::Invoice, march(1))
                .unwrap();
        }

        let err = generator
            .allocate(org, DocumentType::Invoice, march(1))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::FormatOverflow(_))
        ));

        // value 10 stays burned: the next failure reserves 11, never 10 again
        assert_eq!(
            generator
                .current_value(org, DocumentType::Invoice, march(1))
                .unwrap(),
            Some(10)
        );
    }
}
