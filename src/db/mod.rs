//! Database module for SQLite persistence
//!
//! Stores reading progress and highlights per book, and mirrors reader
//! events into those tables.
//!
//! ```text
//!  ReaderCore ──persistence_feed──► persist_events ──► reading_progress
//!                                                 └──► highlights
//! ```

mod highlights;
mod progress;
mod schema;
mod subscriber;

pub use highlights::*;
pub use progress::*;
pub use schema::*;
pub use subscriber::*;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Fixed-width RFC 3339 so stored timestamps sort as text
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidRecord(format!("timestamp {:?}: {}", value, e)))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // a single connection keeps one in-memory database for the whole test
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    initialize_schema(&pool).await.unwrap();
    pool
}
