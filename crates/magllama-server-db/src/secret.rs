// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret repository.
//!
//! Rows hold AES-GCM ciphertext and nonce; encryption happens in the vault
//! before anything reaches this layer. The metadata read paths never select
//! `value_enc`. State transitions are single conditional UPDATEs guarded by
//! `revoked_at IS NULL`, so a revoked row can never be mutated again. Update
//! and rotate are also guarded on `expires_at`: an expired row is read-only.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use magllama_server_auth::{ProjectId, SecretId, SecretOwner, SecretRecord, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{format_ts, parse_id, parse_opt_id, parse_opt_ts, parse_ts};

/// Ciphertext and nonce as stored.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCiphertext {
	pub ciphertext: Vec<u8>,
	pub nonce: Vec<u8>,
}

impl std::fmt::Debug for StoredCiphertext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StoredCiphertext")
			.field("ciphertext_len", &self.ciphertext.len())
			.field("nonce_len", &self.nonce.len())
			.finish()
	}
}

/// Field changes for a conditional update. `None` leaves a column as is.
#[derive(Debug, Default)]
pub struct SecretChanges {
	pub name: Option<String>,
	pub description: Option<String>,
	pub secret_type: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub metadata: Option<BTreeMap<String, String>>,
	pub value: Option<StoredCiphertext>,
}

/// Outcome of a guarded state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
	Applied,
	/// The row exists but is revoked.
	Revoked,
	/// The row exists but `expires_at` has passed.
	Expired,
	NotFound,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
	async fn insert_secret(
		&self,
		record: &SecretRecord,
		value: &StoredCiphertext,
	) -> Result<(), DbError>;
	async fn get_secret(&self, id: &SecretId) -> Result<Option<SecretRecord>, DbError>;
	async fn get_secret_with_ciphertext(
		&self,
		id: &SecretId,
	) -> Result<Option<(SecretRecord, StoredCiphertext)>, DbError>;
	async fn update_secret(
		&self,
		id: &SecretId,
		changes: &SecretChanges,
		updated_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError>;
	async fn rotate_secret(
		&self,
		id: &SecretId,
		value: &StoredCiphertext,
		rotated_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError>;
	async fn revoke_secret(
		&self,
		id: &SecretId,
		revoked_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError>;
	async fn list_secrets_for_user(&self, user_id: &UserId) -> Result<Vec<SecretRecord>, DbError>;
	async fn list_secrets_for_project(
		&self,
		project_id: &ProjectId,
	) -> Result<Vec<SecretRecord>, DbError>;
}

#[async_trait]
impl SecretStore for SecretRepository {
	async fn insert_secret(
		&self,
		record: &SecretRecord,
		value: &StoredCiphertext,
	) -> Result<(), DbError> {
		self.insert_secret(record, value).await
	}

	async fn get_secret(&self, id: &SecretId) -> Result<Option<SecretRecord>, DbError> {
		self.get_secret(id).await
	}

	async fn get_secret_with_ciphertext(
		&self,
		id: &SecretId,
	) -> Result<Option<(SecretRecord, StoredCiphertext)>, DbError> {
		self.get_secret_with_ciphertext(id).await
	}

	async fn update_secret(
		&self,
		id: &SecretId,
		changes: &SecretChanges,
		updated_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		self.update_secret(id, changes, updated_by, at).await
	}

	async fn rotate_secret(
		&self,
		id: &SecretId,
		value: &StoredCiphertext,
		rotated_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		self.rotate_secret(id, value, rotated_by, at).await
	}

	async fn revoke_secret(
		&self,
		id: &SecretId,
		revoked_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		self.revoke_secret(id, revoked_by, at).await
	}

	async fn list_secrets_for_user(&self, user_id: &UserId) -> Result<Vec<SecretRecord>, DbError> {
		self.list_secrets_for_user(user_id).await
	}

	async fn list_secrets_for_project(
		&self,
		project_id: &ProjectId,
	) -> Result<Vec<SecretRecord>, DbError> {
		self.list_secrets_for_project(project_id).await
	}
}

#[derive(Clone)]
pub struct SecretRepository {
	pool: SqlitePool,
}

impl SecretRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, record, value), fields(secret_id = %record.id))]
	pub async fn insert_secret(
		&self,
		record: &SecretRecord,
		value: &StoredCiphertext,
	) -> Result<(), DbError> {
		let metadata = serde_json::to_string(&record.metadata)?;

		sqlx::query(
			r#"
			INSERT INTO secrets (
				id, name, value_enc, nonce, user_id, project_id, created_by, created_at,
				updated_at, updated_by, rotated_at, revoked_at, revoked_by, expires_at,
				description, secret_type, metadata
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(&record.name)
		.bind(&value.ciphertext)
		.bind(&value.nonce)
		.bind(record.owner.user_id().map(|u| u.to_string()))
		.bind(record.owner.project_id().map(|p| p.to_string()))
		.bind(record.created_by.to_string())
		.bind(format_ts(&record.created_at))
		.bind(format_ts(&record.updated_at))
		.bind(record.updated_by.to_string())
		.bind(record.rotated_at.as_ref().map(format_ts))
		.bind(record.revoked_at.as_ref().map(format_ts))
		.bind(record.revoked_by.map(|u| u.to_string()))
		.bind(record.expires_at.as_ref().map(format_ts))
		.bind(&record.description)
		.bind(&record.secret_type)
		.bind(&metadata)
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "secret"))?;

		tracing::debug!(secret_id = %record.id, "secret stored");
		Ok(())
	}

	/// Metadata only; the ciphertext is not selected.
	#[tracing::instrument(skip(self), fields(secret_id = %id))]
	pub async fn get_secret(&self, id: &SecretId) -> Result<Option<SecretRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, user_id, project_id, created_by, created_at, updated_at,
			       updated_by, rotated_at, revoked_at, revoked_by, expires_at,
			       description, secret_type, metadata
			FROM secrets
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_secret_row(&r)).transpose()
	}

	/// Metadata plus ciphertext. Only the reveal path calls this.
	#[tracing::instrument(skip(self), fields(secret_id = %id))]
	pub async fn get_secret_with_ciphertext(
		&self,
		id: &SecretId,
	) -> Result<Option<(SecretRecord, StoredCiphertext)>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, value_enc, nonce, user_id, project_id, created_by, created_at,
			       updated_at, updated_by, rotated_at, revoked_at, revoked_by, expires_at,
			       description, secret_type, metadata
			FROM secrets
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				let record = parse_secret_row(&row)?;
				let value = StoredCiphertext {
					ciphertext: row.get("value_enc"),
					nonce: row.get("nonce"),
				};
				Ok(Some((record, value)))
			}
			None => Ok(None),
		}
	}

	/// Apply `changes` unless the secret is revoked or expired as of `at`.
	#[tracing::instrument(skip(self, changes), fields(secret_id = %id, updated_by = %updated_by))]
	pub async fn update_secret(
		&self,
		id: &SecretId,
		changes: &SecretChanges,
		updated_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		let metadata = changes
			.metadata
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;

		let result = sqlx::query(
			r#"
			UPDATE secrets
			SET name = COALESCE(?, name),
			    description = COALESCE(?, description),
			    secret_type = COALESCE(?, secret_type),
			    expires_at = COALESCE(?, expires_at),
			    metadata = COALESCE(?, metadata),
			    value_enc = COALESCE(?, value_enc),
			    nonce = COALESCE(?, nonce),
			    updated_at = ?,
			    updated_by = ?
			WHERE id = ? AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > ?)
			"#,
		)
		.bind(&changes.name)
		.bind(&changes.description)
		.bind(&changes.secret_type)
		.bind(changes.expires_at.as_ref().map(format_ts))
		.bind(&metadata)
		.bind(changes.value.as_ref().map(|v| v.ciphertext.clone()))
		.bind(changes.value.as_ref().map(|v| v.nonce.clone()))
		.bind(format_ts(&at))
		.bind(updated_by.to_string())
		.bind(id.to_string())
		.bind(format_ts(&at))
		.execute(&self.pool)
		.await?;

		self.transition_outcome(id, result.rows_affected(), at).await
	}

	/// Replace the ciphertext and set `rotated_at == updated_at`. Refused on
	/// revoked or expired rows.
	#[tracing::instrument(skip(self, value), fields(secret_id = %id, rotated_by = %rotated_by))]
	pub async fn rotate_secret(
		&self,
		id: &SecretId,
		value: &StoredCiphertext,
		rotated_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		let ts = format_ts(&at);
		let result = sqlx::query(
			r#"
			UPDATE secrets
			SET value_enc = ?, nonce = ?, rotated_at = ?, updated_at = ?, updated_by = ?
			WHERE id = ? AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > ?)
			"#,
		)
		.bind(&value.ciphertext)
		.bind(&value.nonce)
		.bind(&ts)
		.bind(&ts)
		.bind(rotated_by.to_string())
		.bind(id.to_string())
		.bind(&ts)
		.execute(&self.pool)
		.await?;

		self.transition_outcome(id, result.rows_affected(), at).await
	}

	#[tracing::instrument(skip(self), fields(secret_id = %id, revoked_by = %revoked_by))]
	pub async fn revoke_secret(
		&self,
		id: &SecretId,
		revoked_by: &UserId,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE secrets
			SET revoked_at = ?, revoked_by = ?
			WHERE id = ? AND revoked_at IS NULL
			"#,
		)
		.bind(format_ts(&at))
		.bind(revoked_by.to_string())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		self.transition_outcome(id, result.rows_affected(), at).await
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_secrets_for_user(&self, user_id: &UserId) -> Result<Vec<SecretRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, user_id, project_id, created_by, created_at, updated_at,
			       updated_by, rotated_at, revoked_at, revoked_by, expires_at,
			       description, secret_type, metadata
			FROM secrets
			WHERE user_id = ?
			ORDER BY name, created_at
			"#,
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_secret_row).collect()
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id))]
	pub async fn list_secrets_for_project(
		&self,
		project_id: &ProjectId,
	) -> Result<Vec<SecretRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, user_id, project_id, created_by, created_at, updated_at,
			       updated_by, rotated_at, revoked_at, revoked_by, expires_at,
			       description, secret_type, metadata
			FROM secrets
			WHERE project_id = ?
			ORDER BY name, created_at
			"#,
		)
		.bind(project_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_secret_row).collect()
	}

	/// Explain why a guarded UPDATE matched nothing: revoked, expired as of
	/// `at`, or missing.
	async fn transition_outcome(
		&self,
		id: &SecretId,
		rows_affected: u64,
		at: DateTime<Utc>,
	) -> Result<Transition, DbError> {
		if rows_affected > 0 {
			return Ok(Transition::Applied);
		}

		let row = sqlx::query("SELECT revoked_at, expires_at FROM secrets WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		let Some(row) = row else {
			return Ok(Transition::NotFound);
		};

		if row.get::<Option<String>, _>("revoked_at").is_some() {
			return Ok(Transition::Revoked);
		}
		let expires_at = parse_opt_ts(row.get("expires_at"), "expires_at")?;
		if expires_at.is_some_and(|exp| exp <= at) {
			return Ok(Transition::Expired);
		}
		Err(DbError::Internal(format!(
			"secret {id} matched no row but is neither revoked nor expired"
		)))
	}
}

fn parse_secret_row(row: &sqlx::sqlite::SqliteRow) -> Result<SecretRecord, DbError> {
	let id: String = row.get("id");
	let created_by: String = row.get("created_by");
	let updated_by: String = row.get("updated_by");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let metadata: String = row.get("metadata");

	let user_id: Option<UserId> = parse_opt_id(row.get("user_id"), "user_id")?;
	let project_id: Option<ProjectId> = parse_opt_id(row.get("project_id"), "project_id")?;
	let owner = match (user_id, project_id) {
		(Some(user), None) => SecretOwner::User(user),
		(None, Some(project)) => SecretOwner::Project(project),
		_ => {
			return Err(DbError::Internal(format!(
				"secret {id} must have exactly one owner"
			)))
		}
	};

	Ok(SecretRecord {
		id: parse_id(&id, "secret id")?,
		name: row.get("name"),
		owner,
		created_by: parse_id(&created_by, "created_by")?,
		created_at: parse_ts(&created_at, "created_at")?,
		updated_at: parse_ts(&updated_at, "updated_at")?,
		updated_by: parse_id(&updated_by, "updated_by")?,
		rotated_at: parse_opt_ts(row.get("rotated_at"), "rotated_at")?,
		revoked_at: parse_opt_ts(row.get("revoked_at"), "revoked_at")?,
		revoked_by: parse_opt_id(row.get("revoked_by"), "revoked_by")?,
		expires_at: parse_opt_ts(row.get("expires_at"), "expires_at")?,
		description: row.get("description"),
		secret_type: row.get("secret_type"),
		metadata: serde_json::from_str(&metadata)?,
	})
}
