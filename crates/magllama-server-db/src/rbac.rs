// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and permission repository.
//!
//! Holds the global role graph: `roles`, `permissions`, the
//! `role_permissions` edge, and the `user_roles` edge. Edge inserts are
//! idempotent (`ON CONFLICT DO NOTHING`) and report whether a row was added.

use async_trait::async_trait;
use magllama_server_auth::{Permission, PermissionId, PermissionName, Role, RoleId, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{format_ts, now, parse_id, parse_ts};

#[async_trait]
pub trait RbacStore: Send + Sync {
	async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, DbError>;
	async fn create_permission(
		&self,
		name: &str,
		description: Option<&str>,
	) -> Result<Permission, DbError>;
	async fn get_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, DbError>;
	async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError>;
	async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>, DbError>;
	async fn grant_permission(
		&self,
		role_id: &RoleId,
		permission_id: &PermissionId,
	) -> Result<bool, DbError>;
	async fn revoke_permission(
		&self,
		role_id: &RoleId,
		permission_id: &PermissionId,
	) -> Result<bool, DbError>;
	async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool, DbError>;
	async fn unassign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool, DbError>;
	async fn has_permission(&self, user_id: &UserId, permission: &str) -> Result<bool, DbError>;
	async fn list_roles_for_user(&self, user_id: &UserId) -> Result<Vec<Role>, DbError>;
	async fn list_permissions_for_role(&self, role_id: &RoleId)
		-> Result<Vec<Permission>, DbError>;
	async fn ensure_core_permissions(&self) -> Result<usize, DbError>;
}

#[async_trait]
impl RbacStore for RbacRepository {
	async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, DbError> {
		self.create_role(name, description).await
	}

	async fn create_permission(
		&self,
		name: &str,
		description: Option<&str>,
	) -> Result<Permission, DbError> {
		self.create_permission(name, description).await
	}

	async fn get_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, DbError> {
		self.get_role_by_id(id).await
	}

	async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError> {
		self.get_role_by_name(name).await
	}

	async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>, DbError> {
		self.get_permission_by_name(name).await
	}

	async fn grant_permission(
		&self,
		role_id: &RoleId,
		permission_id: &PermissionId,
	) -> Result<bool, DbError> {
		self.grant_permission(role_id, permission_id).await
	}

	async fn revoke_permission(
		&self,
		role_id: &RoleId,
		permission_id: &PermissionId,
	) -> Result<bool, DbError> {
		self.revoke_permission(role_id, permission_id).await
	}

	async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool, DbError> {
		self.assign_role(user_id, role_id).await
	}

	async fn unassign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool, DbError> {
		self.unassign_role(user_id, role_id).await
	}

	async fn has_permission(&self, user_id: &UserId, permission: &str) -> Result<bool, DbError> {
		self.has_permission(user_id, permission).await
	}

	async fn list_roles_for_user(&self, user_id: &UserId) -> Result<Vec<Role>, DbError> {
		self.list_roles_for_user(user_id).await
	}

	async fn list_permissions_for_role(
		&self,
		role_id: &RoleId,
	) -> Result<Vec<Permission>, DbError> {
		self.list_permissions_for_role(role_id).await
	}

	async fn ensure_core_permissions(&self) -> Result<usize, DbError> {
		self.ensure_core_permissions().await
	}
}

#[derive(Clone)]
pub struct RbacRepository {
	pool: SqlitePool,
}

impl RbacRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a role.
	///
	/// # Errors
	/// `DbError::Conflict` if a role with this name exists.
	#[tracing::instrument(skip(self, description))]
	pub async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, DbError> {
		let role = Role {
			id: RoleId::generate(),
			name: name.to_string(),
			description: description.map(str::to_string),
			created_at: now(),
		};

		sqlx::query(
			r#"
			INSERT INTO roles (id, name, description, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(role.id.to_string())
		.bind(&role.name)
		.bind(&role.description)
		.bind(format_ts(&role.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, &format!("role '{name}'")))?;

		tracing::debug!(role_id = %role.id, "role created");
		Ok(role)
	}

	/// Create a permission.
	///
	/// # Errors
	/// `DbError::Conflict` if a permission with this name exists.
	#[tracing::instrument(skip(self, description))]
	pub async fn create_permission(
		&self,
		name: &str,
		description: Option<&str>,
	) -> Result<Permission, DbError> {
		let permission = Permission {
			id: PermissionId::generate(),
			name: name.to_string(),
			description: description.map(str::to_string),
			created_at: now(),
		};

		sqlx::query(
			r#"
			INSERT INTO permissions (id, name, description, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(permission.id.to_string())
		.bind(&permission.name)
		.bind(&permission.description)
		.bind(format_ts(&permission.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, &format!("permission '{name}'")))?;

		tracing::debug!(permission_id = %permission.id, "permission created");
		Ok(permission)
	}

	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn get_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, description, created_at
			FROM roles
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_role_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, description, created_at
			FROM roles
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_role_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, description, created_at
			FROM permissions
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_permission_row(&r)).transpose()
	}

	/// Add a role→permission edge.
	///
	/// # Returns
	/// `true` if the edge was created, `false` if it already existed.
	///
	/// # Errors
	/// `DbError::NotFound` if the role or permission does not exist.
	#[tracing::instrument(skip(self), fields(role_id = %role_id, permission_id = %permission_id))]
	pub async fn grant_permission(
		&self,
		role_id: &RoleId,
		permission_id: &PermissionId,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO role_permissions (role_id, permission_id)
			VALUES (?, ?)
			ON CONFLICT DO NOTHING
			"#,
		)
		.bind(role_id.to_string())
		.bind(permission_id.to_string())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "role permission"))?;

		let inserted = result.rows_affected() > 0;
		tracing::debug!(inserted, "role permission granted");
		Ok(inserted)
	}

	/// Remove a role→permission edge.
	///
	/// # Returns
	/// `true` if an edge was removed.
	#[tracing::instrument(skip(self), fields(role_id = %role_id, permission_id = %permission_id))]
	pub async fn revoke_permission(
		&self,
		role_id: &RoleId,
		permission_id: &PermissionId,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM role_permissions
			WHERE role_id = ? AND permission_id = ?
			"#,
		)
		.bind(role_id.to_string())
		.bind(permission_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Assign a global role to a user. Duplicate assignment is a no-op.
	///
	/// # Returns
	/// `true` if the assignment was created, `false` if it already existed.
	///
	/// # Errors
	/// `DbError::NotFound` if the role does not exist.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, role_id = %role_id))]
	pub async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO user_roles (user_id, role_id)
			VALUES (?, ?)
			ON CONFLICT DO NOTHING
			"#,
		)
		.bind(user_id.to_string())
		.bind(role_id.to_string())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "user role"))?;

		let inserted = result.rows_affected() > 0;
		if inserted {
			tracing::info!(user_id = %user_id, role_id = %role_id, "role assigned");
		}
		Ok(inserted)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, role_id = %role_id))]
	pub async fn unassign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM user_roles
			WHERE user_id = ? AND role_id = ?
			"#,
		)
		.bind(user_id.to_string())
		.bind(role_id.to_string())
		.execute(&self.pool)
		.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::info!(user_id = %user_id, role_id = %role_id, "role unassigned");
		}
		Ok(removed)
	}

	/// Does a path `user_roles → role_permissions → permissions(name)` exist?
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn has_permission(&self, user_id: &UserId, permission: &str) -> Result<bool, DbError> {
		let row = sqlx::query(
			r#"
			SELECT EXISTS (
				SELECT 1
				FROM user_roles ur
				JOIN role_permissions rp ON rp.role_id = ur.role_id
				JOIN permissions p ON p.id = rp.permission_id
				WHERE ur.user_id = ? AND p.name = ?
			) AS granted
			"#,
		)
		.bind(user_id.to_string())
		.bind(permission)
		.fetch_one(&self.pool)
		.await?;

		let granted: i64 = row.get("granted");
		Ok(granted != 0)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_roles_for_user(&self, user_id: &UserId) -> Result<Vec<Role>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT r.id, r.name, r.description, r.created_at
			FROM roles r
			JOIN user_roles ur ON ur.role_id = r.id
			WHERE ur.user_id = ?
			ORDER BY r.name
			"#,
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_role_row).collect()
	}

	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn list_permissions_for_role(
		&self,
		role_id: &RoleId,
	) -> Result<Vec<Permission>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT p.id, p.name, p.description, p.created_at
			FROM permissions p
			JOIN role_permissions rp ON rp.permission_id = p.id
			WHERE rp.role_id = ?
			ORDER BY p.name
			"#,
		)
		.bind(role_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_permission_row).collect()
	}

	/// Insert every [`PermissionName`] the core checks, skipping existing ones.
	///
	/// # Returns
	/// The number of permissions created.
	#[tracing::instrument(skip(self))]
	pub async fn ensure_core_permissions(&self) -> Result<usize, DbError> {
		let mut created = 0;
		let created_at = format_ts(&now());
		for name in PermissionName::all() {
			let result = sqlx::query(
				r#"
				INSERT INTO permissions (id, name, description, created_at)
				VALUES (?, ?, NULL, ?)
				ON CONFLICT (name) DO NOTHING
				"#,
			)
			.bind(PermissionId::generate().to_string())
			.bind(name.as_str())
			.bind(&created_at)
			.execute(&self.pool)
			.await?;
			created += result.rows_affected() as usize;
		}

		tracing::info!(created, "core permissions ensured");
		Ok(created)
	}
}

fn parse_role_row(row: &sqlx::sqlite::SqliteRow) -> Result<Role, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(Role {
		id: parse_id(&id, "role id")?,
		name: row.get("name"),
		description: row.get("description"),
		created_at: parse_ts(&created_at, "created_at")?,
	})
}

fn parse_permission_row(row: &sqlx::sqlite::SqliteRow) -> Result<Permission, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(Permission {
		id: parse_id(&id, "permission id")?,
		name: row.get("name"),
		description: row.get("description"),
		created_at: parse_ts(&created_at, "created_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	async fn make_repo() -> RbacRepository {
		RbacRepository::new(create_test_pool().await)
	}

	#[tokio::test]
	async fn duplicate_role_name_is_conflict() {
		let repo = make_repo().await;
		repo.create_role("admin", None).await.unwrap();
		let err = repo.create_role("admin", Some("again")).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn duplicate_permission_name_is_conflict() {
		let repo = make_repo().await;
		repo.create_permission("reveal_secret", None).await.unwrap();
		let err = repo
			.create_permission("reveal_secret", None)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn permission_path_exists_only_with_both_edges() {
		let repo = make_repo().await;
		let user = UserId::generate();
		let role = repo.create_role("secrets-admin", None).await.unwrap();
		let perm = repo.create_permission("reveal_secret", None).await.unwrap();

		assert!(!repo.has_permission(&user, "reveal_secret").await.unwrap());

		repo.assign_role(&user, &role.id).await.unwrap();
		assert!(!repo.has_permission(&user, "reveal_secret").await.unwrap());

		repo.grant_permission(&role.id, &perm.id).await.unwrap();
		assert!(repo.has_permission(&user, "reveal_secret").await.unwrap());
		assert!(!repo.has_permission(&user, "rotate_secret").await.unwrap());

		assert!(repo.revoke_permission(&role.id, &perm.id).await.unwrap());
		assert!(!repo.has_permission(&user, "reveal_secret").await.unwrap());
	}

	#[tokio::test]
	async fn assign_role_is_idempotent() {
		let repo = make_repo().await;
		let user = UserId::generate();
		let role = repo.create_role("viewer", None).await.unwrap();

		assert!(repo.assign_role(&user, &role.id).await.unwrap());
		assert!(!repo.assign_role(&user, &role.id).await.unwrap());

		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ?")
			.bind(user.to_string())
			.fetch_one(&repo.pool)
			.await
			.unwrap();
		assert_eq!(count, 1);

		let roles = repo.list_roles_for_user(&user).await.unwrap();
		assert_eq!(roles.len(), 1);
		assert_eq!(roles[0].name, "viewer");
	}

	#[tokio::test]
	async fn assigning_unknown_role_is_not_found() {
		let repo = make_repo().await;
		let err = repo
			.assign_role(&UserId::generate(), &RoleId::generate())
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn unassign_removes_access() {
		let repo = make_repo().await;
		let user = UserId::generate();
		let role = repo.create_role("ops", None).await.unwrap();
		let perm = repo.create_permission("rotate_secret", None).await.unwrap();
		repo.grant_permission(&role.id, &perm.id).await.unwrap();
		repo.assign_role(&user, &role.id).await.unwrap();
		assert!(repo.has_permission(&user, "rotate_secret").await.unwrap());

		assert!(repo.unassign_role(&user, &role.id).await.unwrap());
		assert!(!repo.unassign_role(&user, &role.id).await.unwrap());
		assert!(!repo.has_permission(&user, "rotate_secret").await.unwrap());
	}

	#[tokio::test]
	async fn ensure_core_permissions_is_repeatable() {
		let repo = make_repo().await;
		let first = repo.ensure_core_permissions().await.unwrap();
		assert_eq!(first, PermissionName::all().len());
		assert_eq!(repo.ensure_core_permissions().await.unwrap(), 0);

		let perm = repo
			.get_permission_by_name(PermissionName::RevealSecret.as_str())
			.await
			.unwrap();
		assert!(perm.is_some());
	}

	#[tokio::test]
	async fn lookups_by_name_and_id() {
		let repo = make_repo().await;
		let role = repo.create_role("member", Some("project member")).await.unwrap();

		let by_name = repo.get_role_by_name("member").await.unwrap().unwrap();
		assert_eq!(by_name, role);
		let by_id = repo.get_role_by_id(&role.id).await.unwrap().unwrap();
		assert_eq!(by_id.description.as_deref(), Some("project member"));
		assert!(repo.get_role_by_name("missing").await.unwrap().is_none());
	}
}
