// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./magllama.db")
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
/// Returns `DbError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.busy_timeout(Duration::from_secs(5))
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(max_connections.max(1))
		.connect_with(options)
		.await?;

	tracing::debug!(max_connections, "database pool created");
	Ok(pool)
}

/// Apply the embedded schema migrations.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	sqlx::migrate!("./migrations").run(pool).await?;
	tracing::info!("database migrations applied");
	Ok(())
}
