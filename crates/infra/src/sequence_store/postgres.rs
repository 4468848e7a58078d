//! Postgres-backed counter store.
//!
//! Counter rows live in `sequence_counters`:
//!
//! ```sql
//! CREATE TABLE sequence_counters (
//!     organization_id UUID        NOT NULL,
//!     document_type   TEXT        NOT NULL,
//!     period_key      TEXT        NOT NULL,
//!     current_value   BIGINT      NOT NULL CHECK (current_value > 0),
//!     PRIMARY KEY (organization_id, document_type, period_key)
//! );
//! ```
//!
//! Reservation is a single upsert statement, so two concurrent callers are
//! serialized by the row lock and always receive distinct values. Rows are
//! never deleted; a new period simply inserts a fresh row starting at 1.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::error::StoreError;
use crate::pg::{block_on_runtime, map_sqlx_error};

use super::{SequenceKey, SequenceStore};

/// Postgres counter store. Thread-safe via the SQLx pool.
#[derive(Debug, Clone)]
pub struct PostgresSequenceStore {
    pool: Arc<PgPool>,
}

impl PostgresSequenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(
        skip(self),
        fields(
            organization_id = %key.organization_id.as_uuid(),
            document_type = %key.document_type,
            period_key = %key.period_key
        ),
        err
    )]
    pub async fn reserve_next_async(&self, key: &SequenceKey) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sequence_counters (organization_id, document_type, period_key, current_value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (organization_id, document_type, period_key)
            DO UPDATE SET current_value = sequence_counters.current_value + 1
            RETURNING current_value
            "#,
        )
        .bind(key.organization_id.as_uuid())
        .bind(key.document_type.as_str())
        .bind(key.period_key.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reserve_next", e))?;

        row.try_get::<i64, _>("current_value")
            .map_err(|e| StoreError::Serialization(format!("counter row: {e}")))
    }

    pub async fn current_value_async(&self, key: &SequenceKey) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT current_value
            FROM sequence_counters
            WHERE organization_id = $1 AND document_type = $2 AND period_key = $3
            "#,
        )
        .bind(key.organization_id.as_uuid())
        .bind(key.document_type.as_str())
        .bind(key.period_key.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("current_value", e))?;

        row.map(|r| {
            r.try_get::<i64, _>("current_value")
                .map_err(|e| StoreError::Serialization(format!("counter row: {e}")))
        })
        .transpose()
    }
}

impl SequenceStore for PostgresSequenceStore {
    fn reserve_next(&self, key: &SequenceKey) -> Result<i64, StoreError> {
        block_on_runtime(self.reserve_next_async(key))
    }

    fn current_value(&self, key: &SequenceKey) -> Result<Option<i64>, StoreError> {
        block_on_runtime(self.current_value_async(key))
    }
}
