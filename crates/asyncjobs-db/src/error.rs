//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DbError> for asyncjobs_core::Error {
    fn from(err: DbError) -> Self {
        asyncjobs_core::Error::Storage(err.to_string())
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
