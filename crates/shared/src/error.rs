//! Error types for the credential store

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(&'static str),

    /// The conditional invite update matched no row: unknown token,
    /// already consumed, or expired.
    #[error("Invite is not available")]
    InviteUnavailable,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Map a PostgreSQL unique violation onto `Conflict`, anything else onto `Database`
    pub fn unique_violation(err: sqlx::Error, what: &'static str) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                tracing::debug!(
                    constraint = ?db_err.constraint(),
                    what,
                    "Unique constraint violated"
                );
                return StoreError::Conflict(what);
            }
        }
        StoreError::Database(err)
    }
}
