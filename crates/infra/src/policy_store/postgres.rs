//! Postgres-backed policy store.
//!
//! ```sql
//! CREATE TABLE numbering_policies (
//!     organization_id UUID  NOT NULL,
//!     document_type   TEXT  NOT NULL,
//!     policy          JSONB NOT NULL,
//!     PRIMARY KEY (organization_id, document_type)
//! );
//! ```

use std::sync::Arc;

use sqlx::{PgPool, Row};

use kontor_core::OrganizationId;
use kontor_numbering::{DocumentType, NumberingPolicy};

use crate::error::StoreError;
use crate::pg::{block_on_runtime, map_sqlx_error};

use super::PolicyStore;

#[derive(Debug, Clone)]
pub struct PostgresPolicyStore {
    pool: Arc<PgPool>,
}

impl PostgresPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn get_async(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<Option<NumberingPolicy>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT policy
            FROM numbering_policies
            WHERE organization_id = $1 AND document_type = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(document_type.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_policy", e))?;

        row.map(|r| {
            let value: serde_json::Value = r
                .try_get("policy")
                .map_err(|e| StoreError::Serialization(format!("policy row: {e}")))?;
            serde_json::from_value(value)
                .map_err(|e| StoreError::Serialization(format!("policy payload: {e}")))
        })
        .transpose()
    }

    pub async fn upsert_async(&self, policy: &NumberingPolicy) -> Result<(), StoreError> {
        let payload = serde_json::to_value(policy)
            .map_err(|e| StoreError::Serialization(format!("policy payload: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO numbering_policies (organization_id, document_type, policy)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, document_type)
            DO UPDATE SET policy = EXCLUDED.policy
            "#,
        )
        .bind(policy.organization_id.as_uuid())
        .bind(policy.document_type.as_str())
        .bind(payload)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_policy", e))?;

        Ok(())
    }
}

impl PolicyStore for PostgresPolicyStore {
    fn get(
        &self,
        organization_id: OrganizationId,
        document_type: DocumentType,
    ) -> Result<Option<NumberingPolicy>, StoreError> {
        block_on_runtime(self.get_async(organization_id, document_type))
    }

    fn upsert(&self, policy: NumberingPolicy) -> Result<(), StoreError> {
        block_on_runtime(self.upsert_async(&policy))
    }
}
