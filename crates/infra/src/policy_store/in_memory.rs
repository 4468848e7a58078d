use std::collections::HashMap;
use std::sync::RwLock;

use kontor_core::OrganizationId;
use kontor_numbering::{DocumentType, NumberingPolicy};

use crate::error::StoreError;

use super::PolicyStore;

/// In-memory policy registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<(OrganizationId, DocumentType), NumberingPolicy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn get(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<Option<NumberingPolicy>, StoreError> {
        let policies = self
            .policies
            .read()
            .map_err(|_| StoreError::Backend("policy lock poisoned".to_string()))?;

        Ok(policies.get(&(organization_id, document_type)).cloned())
    }

    fn upsert(&self, policy: NumberingPolicy) -> Result<(), StoreError> {
        let mut policies = self
            .policies
            .write()
            .map_err(|_| StoreError::Backend("policy lock poisoned".to_string()))?;

        policies.insert((policy.organization_id, policy.document_type), policy);
        Ok(())
    }
}
