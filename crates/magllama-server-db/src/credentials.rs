// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Username/password records for the password identity provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use magllama_server_auth::UserId;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{format_ts, now, parse_id, parse_ts};

/// A stored login. `password_hash` is an Argon2id PHC string.
#[derive(Clone)]
pub struct UserCredentials {
	pub user_id: UserId,
	pub username: String,
	pub password_hash: String,
	pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserCredentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UserCredentials")
			.field("user_id", &self.user_id)
			.field("username", &self.username)
			.field("password_hash", &"[REDACTED]")
			.field("created_at", &self.created_at)
			.finish()
	}
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn create_credentials(
		&self,
		user_id: &UserId,
		username: &str,
		password_hash: &str,
	) -> Result<UserCredentials, DbError>;
	async fn get_credentials_by_username(
		&self,
		username: &str,
	) -> Result<Option<UserCredentials>, DbError>;
}

#[async_trait]
impl CredentialStore for CredentialRepository {
	async fn create_credentials(
		&self,
		user_id: &UserId,
		username: &str,
		password_hash: &str,
	) -> Result<UserCredentials, DbError> {
		self
			.create_credentials(user_id, username, password_hash)
			.await
	}

	async fn get_credentials_by_username(
		&self,
		username: &str,
	) -> Result<Option<UserCredentials>, DbError> {
		self.get_credentials_by_username(username).await
	}
}

#[derive(Clone)]
pub struct CredentialRepository {
	pool: SqlitePool,
}

impl CredentialRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// # Errors
	/// `DbError::Conflict` if the username or user already has credentials.
	#[tracing::instrument(skip(self, password_hash), fields(user_id = %user_id))]
	pub async fn create_credentials(
		&self,
		user_id: &UserId,
		username: &str,
		password_hash: &str,
	) -> Result<UserCredentials, DbError> {
		let created = UserCredentials {
			user_id: *user_id,
			username: username.to_string(),
			password_hash: password_hash.to_string(),
			created_at: now(),
		};

		sqlx::query(
			r#"
			INSERT INTO user_credentials (user_id, username, password_hash, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(created.user_id.to_string())
		.bind(&created.username)
		.bind(&created.password_hash)
		.bind(format_ts(&created.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "credentials"))?;

		tracing::debug!(user_id = %user_id, "credentials created");
		Ok(created)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_credentials_by_username(
		&self,
		username: &str,
	) -> Result<Option<UserCredentials>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT user_id, username, password_hash, created_at
			FROM user_credentials
			WHERE username = ?
			"#,
		)
		.bind(username)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_credentials_row(&r)).transpose()
	}
}

fn parse_credentials_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserCredentials, DbError> {
	let user_id: String = row.get("user_id");
	let created_at: String = row.get("created_at");

	Ok(UserCredentials {
		user_id: parse_id(&user_id, "user_id")?,
		username: row.get("username"),
		password_hash: row.get("password_hash"),
		created_at: parse_ts(&created_at, "created_at")?,
	})
}
