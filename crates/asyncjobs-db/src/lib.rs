//! Job store for asyncjobs.
//!
//! Provides the `JobRepo` trait with PostgreSQL and in-memory implementations.

pub mod error;
pub mod repo;

pub use error::{DbError, DbResult};
pub use repo::*;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create the job table if it does not exist yet.
///
/// `table` must already be a validated SQL identifier.
pub async fn ensure_schema(pool: &PgPool, table: &str) -> DbResult<()> {
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            parameters TEXT,
            results TEXT,
            status TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}
