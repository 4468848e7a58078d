//! Shared plumbing for the Postgres store implementations.

use crate::error::StoreError;

/// Run an async store operation from a synchronous store trait.
///
/// Callers sit on a multi-thread tokio runtime (the axum server); the worker
/// thread is moved to blocking mode for the duration of the wait, since
/// `Handle::block_on` alone panics when invoked from inside the runtime.
pub(crate) fn block_on_runtime<F, T>(fut: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend("Postgres stores require a tokio runtime context".to_string())
    })?;
    tokio::task::block_in_place(|| handle.block_on(fut))
}


pub(crate) fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    match &e {
        // 23505: concurrent writer won the race on a unique key.
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Conflict(format!("{operation}: unique violation: {db}"))
        }
        _ => StoreError::Backend(format!("{operation}: {e}")),
    }
}
