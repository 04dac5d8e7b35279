// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key repository for database operations.
//!
//! API keys are scoped to a user or a project and used for programmatic
//! access. Only the SHA-256 digest of a token is ever stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use magllama_server_auth::{ApiKey, ApiKeyId, ProjectId, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{format_ts, now, parse_id, parse_opt_id, parse_opt_ts, parse_ts};

/// Input for storing a new key.
#[derive(Debug, Clone)]
pub struct NewApiKey<'a> {
	pub user_id: Option<UserId>,
	pub project_id: Option<ProjectId>,
	pub key_hash: &'a str,
	pub description: Option<&'a str>,
}

/// Outcome of [`ApiKeyRepository::touch_last_used`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastUsed {
	Moved,
	/// The key is active but already carries a later timestamp.
	Unchanged,
	/// The key was revoked (or deleted) since it was looked up.
	Inactive,
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
	async fn create_api_key(&self, key: NewApiKey<'_>) -> Result<ApiKey, DbError>;
	async fn get_api_key_by_id(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DbError>;
	async fn get_active_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError>;
	async fn list_api_keys_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DbError>;
	async fn list_api_keys_for_project(
		&self,
		project_id: &ProjectId,
	) -> Result<Vec<ApiKey>, DbError>;
	async fn revoke_api_key(&self, id: &ApiKeyId, revoked_by: &UserId) -> Result<bool, DbError>;
	async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<LastUsed, DbError>;
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
	async fn create_api_key(&self, key: NewApiKey<'_>) -> Result<ApiKey, DbError> {
		self.create_api_key(key).await
	}

	async fn get_api_key_by_id(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DbError> {
		self.get_api_key_by_id(id).await
	}

	async fn get_active_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
		self.get_active_api_key_by_hash(key_hash).await
	}

	async fn list_api_keys_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DbError> {
		self.list_api_keys_for_user(user_id).await
	}

	async fn list_api_keys_for_project(
		&self,
		project_id: &ProjectId,
	) -> Result<Vec<ApiKey>, DbError> {
		self.list_api_keys_for_project(project_id).await
	}

	async fn revoke_api_key(&self, id: &ApiKeyId, revoked_by: &UserId) -> Result<bool, DbError> {
		self.revoke_api_key(id, revoked_by).await
	}

	async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<LastUsed, DbError> {
		self.touch_last_used(id, at).await
	}
}

/// Repository for API key database operations.
///
/// All tokens are stored as hashes, never in plaintext.
#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	/// Create a new API key repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Store a new API key.
	///
	/// # Database Constraints
	/// - `key_hash` is unique; a collision surfaces as `DbError::Conflict`
	/// - `project_id`, when set, must reference an existing project
	#[tracing::instrument(skip(self, key), fields(user_id = ?key.user_id, project_id = ?key.project_id))]
	pub async fn create_api_key(&self, key: NewApiKey<'_>) -> Result<ApiKey, DbError> {
		let created = ApiKey {
			id: ApiKeyId::generate(),
			user_id: key.user_id,
			project_id: key.project_id,
			key_hash: key.key_hash.to_string(),
			description: key.description.map(str::to_string),
			created_at: now(),
			last_used_at: None,
			inactive_at: None,
			inactivated_by: None,
		};

		sqlx::query(
			r#"
			INSERT INTO api_keys (id, user_id, project_id, key_hash, description, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(created.id.to_string())
		.bind(created.user_id.map(|u| u.to_string()))
		.bind(created.project_id.map(|p| p.to_string()))
		.bind(&created.key_hash)
		.bind(&created.description)
		.bind(format_ts(&created.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "api key"))?;

		tracing::debug!(api_key_id = %created.id, "API key created");
		Ok(created)
	}

	/// Get an API key by its ID.
	///
	/// # Note
	/// Returns the key regardless of revocation status - caller should check `inactive_at`.
	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	pub async fn get_api_key_by_id(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, project_id, key_hash, description, created_at,
			       last_used_at, inactive_at, inactivated_by
			FROM api_keys
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_api_key_row(&r)).transpose()
	}

	/// Get an active API key by its digest.
	///
	/// Inactive keys are filtered in SQL, so a revoked key and an unknown key
	/// both come back as `None`.
	#[tracing::instrument(skip(self, key_hash))]
	pub async fn get_active_api_key_by_hash(
		&self,
		key_hash: &str,
	) -> Result<Option<ApiKey>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, project_id, key_hash, description, created_at,
			       last_used_at, inactive_at, inactivated_by
			FROM api_keys
			WHERE key_hash = ? AND inactive_at IS NULL
			"#,
		)
		.bind(key_hash)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				let key = parse_api_key_row(&row)?;
				tracing::debug!(api_key_id = %key.id, "API key found by hash");
				Ok(Some(key))
			}
			None => Ok(None),
		}
	}

	/// List the user-scoped keys of a user (project keys they issued are
	/// listed under the project).
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_api_keys_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, user_id, project_id, key_hash, description, created_at,
			       last_used_at, inactive_at, inactivated_by
			FROM api_keys
			WHERE user_id = ? AND project_id IS NULL
			ORDER BY created_at DESC
			"#,
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let keys = rows
			.iter()
			.map(parse_api_key_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = keys.len(), "listed API keys for user");
		Ok(keys)
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id))]
	pub async fn list_api_keys_for_project(
		&self,
		project_id: &ProjectId,
	) -> Result<Vec<ApiKey>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, user_id, project_id, key_hash, description, created_at,
			       last_used_at, inactive_at, inactivated_by
			FROM api_keys
			WHERE project_id = ?
			ORDER BY created_at DESC
			"#,
		)
		.bind(project_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let keys = rows
			.iter()
			.map(parse_api_key_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = keys.len(), "listed API keys for project");
		Ok(keys)
	}

	/// Revoke an API key.
	///
	/// # Returns
	/// `true` if this call revoked the key, `false` if it was already inactive.
	///
	/// # Errors
	/// `DbError::NotFound` if no key has this id.
	#[tracing::instrument(skip(self), fields(api_key_id = %id, revoked_by = %revoked_by))]
	pub async fn revoke_api_key(&self, id: &ApiKeyId, revoked_by: &UserId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE api_keys
			SET inactive_at = ?, inactivated_by = ?
			WHERE id = ? AND inactive_at IS NULL
			"#,
		)
		.bind(format_ts(&now()))
		.bind(revoked_by.to_string())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 {
			tracing::info!(api_key_id = %id, revoked_by = %revoked_by, "API key revoked");
			return Ok(true);
		}

		match self.get_api_key_by_id(id).await? {
			Some(_) => Ok(false),
			None => Err(DbError::NotFound(format!("api key {id}"))),
		}
	}

	/// Advance `last_used_at` to `at` on an active key, never moving it
	/// backwards. Reports [`LastUsed::Inactive`] when the key was revoked
	/// after it was looked up.
	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	pub async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<LastUsed, DbError> {
		let at = format_ts(&at);
		let result = sqlx::query(
			r#"
			UPDATE api_keys
			SET last_used_at = ?
			WHERE id = ? AND inactive_at IS NULL
			  AND (last_used_at IS NULL OR last_used_at < ?)
			"#,
		)
		.bind(&at)
		.bind(id.to_string())
		.bind(&at)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 {
			tracing::debug!(api_key_id = %id, "API key last_used updated");
			return Ok(LastUsed::Moved);
		}

		let active = sqlx::query("SELECT 1 FROM api_keys WHERE id = ? AND inactive_at IS NULL")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?
			.is_some();
		Ok(if active {
			LastUsed::Unchanged
		} else {
			LastUsed::Inactive
		})
	}
}

fn parse_api_key_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKey, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(ApiKey {
		id: parse_id(&id, "api_key id")?,
		user_id: parse_opt_id(row.get("user_id"), "user_id")?,
		project_id: parse_opt_id(row.get("project_id"), "project_id")?,
		key_hash: row.get("key_hash"),
		description: row.get("description"),
		created_at: parse_ts(&created_at, "created_at")?,
		last_used_at: parse_opt_ts(row.get("last_used_at"), "last_used_at")?,
		inactive_at: parse_opt_ts(row.get("inactive_at"), "inactive_at")?,
		inactivated_by: parse_opt_id(row.get("inactivated_by"), "inactivated_by")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::project::ProjectRepository;
	use crate::testing::create_test_pool;
	use chrono::Duration;
	use magllama_server_auth::{hash_api_key, NewProject};
	use proptest::prelude::*;
	use std::collections::HashSet;

	async fn make_repo() -> ApiKeyRepository {
		ApiKeyRepository::new(create_test_pool().await)
	}

	fn user_key<'a>(user_id: UserId, key_hash: &'a str) -> NewApiKey<'a> {
		NewApiKey {
			user_id: Some(user_id),
			project_id: None,
			key_hash,
			description: Some("ci"),
		}
	}

	#[tokio::test]
	async fn create_and_get_api_key() {
		let repo = make_repo().await;
		let user = UserId::generate();

		let created = repo.create_api_key(user_key(user, "hash123")).await.unwrap();
		let fetched = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();

		assert_eq!(fetched, created);
		assert_eq!(fetched.user_id, Some(user));
		assert_eq!(fetched.description.as_deref(), Some("ci"));
		assert!(fetched.is_active());
	}

	#[tokio::test]
	async fn get_api_key_not_found() {
		let repo = make_repo().await;
		assert!(repo
			.get_api_key_by_id(&ApiKeyId::generate())
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn duplicate_hash_is_conflict() {
		let repo = make_repo().await;
		let user = UserId::generate();
		repo.create_api_key(user_key(user, "same")).await.unwrap();
		let err = repo.create_api_key(user_key(user, "same")).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn revoked_key_is_invisible_to_hash_lookup() {
		let repo = make_repo().await;
		let user = UserId::generate();
		let hash = hash_api_key("mgl_example");
		let created = repo.create_api_key(user_key(user, &hash)).await.unwrap();

		assert!(repo.get_active_api_key_by_hash(&hash).await.unwrap().is_some());

		assert!(repo.revoke_api_key(&created.id, &user).await.unwrap());
		assert!(repo.get_active_api_key_by_hash(&hash).await.unwrap().is_none());

		let stored = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();
		assert!(stored.inactive_at.is_some());
		assert_eq!(stored.inactivated_by, Some(user));
	}

	#[tokio::test]
	async fn revoke_is_idempotent_and_unknown_is_not_found() {
		let repo = make_repo().await;
		let user = UserId::generate();
		let created = repo.create_api_key(user_key(user, "h")).await.unwrap();

		assert!(repo.revoke_api_key(&created.id, &user).await.unwrap());
		let first = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();
		assert!(!repo.revoke_api_key(&created.id, &user).await.unwrap());
		let second = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();
		assert_eq!(first.inactive_at, second.inactive_at);

		let err = repo
			.revoke_api_key(&ApiKeyId::generate(), &user)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn last_used_never_moves_backwards() {
		let repo = make_repo().await;
		let created = repo
			.create_api_key(user_key(UserId::generate(), "h"))
			.await
			.unwrap();

		let t1 = now();
		let t0 = t1 - Duration::seconds(10);
		let t2 = t1 + Duration::seconds(10);

		assert_eq!(
			repo.touch_last_used(&created.id, t1).await.unwrap(),
			LastUsed::Moved
		);
		assert_eq!(
			repo.touch_last_used(&created.id, t0).await.unwrap(),
			LastUsed::Unchanged
		);
		let stored = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();
		assert_eq!(stored.last_used_at, Some(t1));

		assert_eq!(
			repo.touch_last_used(&created.id, t2).await.unwrap(),
			LastUsed::Moved
		);
		let stored = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();
		assert_eq!(stored.last_used_at, Some(t2));
	}

	#[tokio::test]
	async fn revoked_key_is_not_touched() {
		let repo = make_repo().await;
		let owner = UserId::generate();
		let created = repo
			.create_api_key(user_key(owner, "h-revoked"))
			.await
			.unwrap();
		let looked_up = repo
			.get_active_api_key_by_hash("h-revoked")
			.await
			.unwrap()
			.unwrap();

		assert!(repo.revoke_api_key(&created.id, &owner).await.unwrap());
		assert_eq!(
			repo.touch_last_used(&looked_up.id, now()).await.unwrap(),
			LastUsed::Inactive
		);
		let stored = repo.get_api_key_by_id(&created.id).await.unwrap().unwrap();
		assert!(stored.last_used_at.is_none());

		assert_eq!(
			repo.touch_last_used(&ApiKeyId::generate(), now()).await.unwrap(),
			LastUsed::Inactive
		);
	}

	#[tokio::test]
	async fn listings_split_user_and_project_keys() {
		let pool = create_test_pool().await;
		let repo = ApiKeyRepository::new(pool.clone());
		let projects = ProjectRepository::new(pool);
		let project = projects
			.create_project(&NewProject {
				name: "p".to_string(),
				..Default::default()
			})
			.await
			.unwrap();
		let user = UserId::generate();

		repo.create_api_key(user_key(user, "u1")).await.unwrap();
		repo.create_api_key(NewApiKey {
			user_id: Some(user),
			project_id: Some(project.id),
			key_hash: "p1",
			description: None,
		})
		.await
		.unwrap();

		let user_keys = repo.list_api_keys_for_user(&user).await.unwrap();
		assert_eq!(user_keys.len(), 1);
		assert!(user_keys[0].project_id.is_none());

		let project_keys = repo.list_api_keys_for_project(&project.id).await.unwrap();
		assert_eq!(project_keys.len(), 1);
		assert_eq!(project_keys[0].user_id, Some(user));
	}

	proptest! {
		#[test]
		fn api_key_id_generation_is_unique(count in 1..1000usize) {
			let mut ids = HashSet::new();
			for _ in 0..count {
				let id = ApiKeyId::generate();
				prop_assert!(ids.insert(id.to_string()), "Generated duplicate ApiKeyId");
			}
		}
	}
}
