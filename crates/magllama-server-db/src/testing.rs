// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory pools for tests.
//!
//! Every connection to `:memory:` opens a separate database, so the pool is
//! capped at one connection.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::pool::run_migrations;

pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool)
		.await
		.expect("Failed to apply migrations to test pool");

	pool
}
