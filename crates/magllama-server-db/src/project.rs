// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project repository for database operations.
//!
//! Projects are soft-deleted via `inactive_at`. Membership is the ternary
//! `project_members` edge `(project_id, user_id, role_id)`; inserting an
//! existing edge is a no-op.

use async_trait::async_trait;
use magllama_server_auth::{NewProject, Project, ProjectId, ProjectMember, RoleId, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{format_ts, now, parse_id, parse_opt_id, parse_opt_ts, parse_ts};

const ACCESS_ANY_ROLE: &str = r#"
	SELECT EXISTS (
		SELECT 1
		FROM project_members pm
		JOIN projects p ON p.id = pm.project_id
		WHERE pm.user_id = ? AND pm.project_id = ? AND p.inactive_at IS NULL
	) AS granted
"#;

const ACCESS_WITH_ROLE: &str = r#"
	SELECT EXISTS (
		SELECT 1
		FROM project_members pm
		JOIN projects p ON p.id = pm.project_id
		JOIN roles r ON r.id = pm.role_id
		WHERE pm.user_id = ? AND pm.project_id = ? AND p.inactive_at IS NULL
		  AND r.name = ?
	) AS granted
"#;

#[async_trait]
pub trait ProjectStore: Send + Sync {
	async fn create_project(&self, project: &NewProject) -> Result<Project, DbError>;
	async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, DbError>;
	async fn add_member(&self, member: &ProjectMember) -> Result<bool, DbError>;
	async fn remove_member(&self, member: &ProjectMember) -> Result<bool, DbError>;
	async fn list_members(&self, project_id: &ProjectId) -> Result<Vec<ProjectMember>, DbError>;
	async fn has_project_access(
		&self,
		user_id: &UserId,
		project_id: &ProjectId,
		required_role: Option<&str>,
	) -> Result<bool, DbError>;
	async fn inactivate_project(
		&self,
		id: &ProjectId,
		inactivated_by: &UserId,
	) -> Result<bool, DbError>;
}

#[async_trait]
impl ProjectStore for ProjectRepository {
	async fn create_project(&self, project: &NewProject) -> Result<Project, DbError> {
		self.create_project(project).await
	}

	async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, DbError> {
		self.get_project(id).await
	}

	async fn add_member(&self, member: &ProjectMember) -> Result<bool, DbError> {
		self.add_member(member).await
	}

	async fn remove_member(&self, member: &ProjectMember) -> Result<bool, DbError> {
		self.remove_member(member).await
	}

	async fn list_members(&self, project_id: &ProjectId) -> Result<Vec<ProjectMember>, DbError> {
		self.list_members(project_id).await
	}

	async fn has_project_access(
		&self,
		user_id: &UserId,
		project_id: &ProjectId,
		required_role: Option<&str>,
	) -> Result<bool, DbError> {
		self
			.has_project_access(user_id, project_id, required_role)
			.await
	}

	async fn inactivate_project(
		&self,
		id: &ProjectId,
		inactivated_by: &UserId,
	) -> Result<bool, DbError> {
		self.inactivate_project(id, inactivated_by).await
	}
}

#[derive(Clone)]
pub struct ProjectRepository {
	pool: SqlitePool,
}

impl ProjectRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a project.
	///
	/// # Errors
	/// `DbError::NotFound` if `parent_id` does not reference a project.
	#[tracing::instrument(skip(self, project), fields(name = %project.name))]
	pub async fn create_project(&self, project: &NewProject) -> Result<Project, DbError> {
		let created = Project {
			id: ProjectId::generate(),
			name: project.name.clone(),
			parent_id: project.parent_id,
			description: project.description.clone(),
			created_at: now(),
			inactive_at: None,
			inactivated_by: None,
		};

		sqlx::query(
			r#"
			INSERT INTO projects (id, name, parent_id, description, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(created.id.to_string())
		.bind(&created.name)
		.bind(created.parent_id.map(|p| p.to_string()))
		.bind(&created.description)
		.bind(format_ts(&created.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "project"))?;

		tracing::debug!(project_id = %created.id, "project created");
		Ok(created)
	}

	/// Get a project by id, active or not.
	#[tracing::instrument(skip(self), fields(project_id = %id))]
	pub async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, parent_id, description, created_at, inactive_at, inactivated_by
			FROM projects
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_project_row(&r)).transpose()
	}

	/// Add a member edge.
	///
	/// # Returns
	/// `true` if the edge was created, `false` if it already existed.
	///
	/// # Errors
	/// `DbError::NotFound` if the project or role does not exist.
	#[tracing::instrument(
		skip(self, member),
		fields(project_id = %member.project_id, user_id = %member.user_id, role_id = %member.role_id)
	)]
	pub async fn add_member(&self, member: &ProjectMember) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO project_members (project_id, user_id, role_id)
			VALUES (?, ?, ?)
			ON CONFLICT DO NOTHING
			"#,
		)
		.bind(member.project_id.to_string())
		.bind(member.user_id.to_string())
		.bind(member.role_id.to_string())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_constraint(e, "project member"))?;

		let inserted = result.rows_affected() > 0;
		tracing::debug!(inserted, "project member added");
		Ok(inserted)
	}

	#[tracing::instrument(
		skip(self, member),
		fields(project_id = %member.project_id, user_id = %member.user_id)
	)]
	pub async fn remove_member(&self, member: &ProjectMember) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM project_members
			WHERE project_id = ? AND user_id = ? AND role_id = ?
			"#,
		)
		.bind(member.project_id.to_string())
		.bind(member.user_id.to_string())
		.bind(member.role_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id))]
	pub async fn list_members(&self, project_id: &ProjectId) -> Result<Vec<ProjectMember>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT project_id, user_id, role_id
			FROM project_members
			WHERE project_id = ?
			ORDER BY user_id, role_id
			"#,
		)
		.bind(project_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_member_row).collect()
	}

	/// Is `user_id` a member of the active project `project_id`, optionally
	/// with the role named `required_role`?
	///
	/// Two fixed statements; the role filter is never spliced into SQL.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
	pub async fn has_project_access(
		&self,
		user_id: &UserId,
		project_id: &ProjectId,
		required_role: Option<&str>,
	) -> Result<bool, DbError> {
		let query = match required_role {
			None => sqlx::query(ACCESS_ANY_ROLE)
				.bind(user_id.to_string())
				.bind(project_id.to_string()),
			Some(role) => sqlx::query(ACCESS_WITH_ROLE)
				.bind(user_id.to_string())
				.bind(project_id.to_string())
				.bind(role.to_string()),
		};

		let row = query.fetch_one(&self.pool).await?;
		let granted: i64 = row.get("granted");
		Ok(granted != 0)
	}

	/// Soft-delete a project.
	///
	/// # Returns
	/// `true` if this call inactivated it, `false` if it was already inactive.
	///
	/// # Errors
	/// `DbError::NotFound` if the project does not exist.
	#[tracing::instrument(skip(self), fields(project_id = %id, inactivated_by = %inactivated_by))]
	pub async fn inactivate_project(
		&self,
		id: &ProjectId,
		inactivated_by: &UserId,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE projects
			SET inactive_at = ?, inactivated_by = ?
			WHERE id = ? AND inactive_at IS NULL
			"#,
		)
		.bind(format_ts(&now()))
		.bind(inactivated_by.to_string())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 {
			tracing::info!(project_id = %id, "project inactivated");
			return Ok(true);
		}

		match self.get_project(id).await? {
			Some(_) => Ok(false),
			None => Err(DbError::NotFound(format!("project {id}"))),
		}
	}
}

fn parse_project_row(row: &sqlx::sqlite::SqliteRow) -> Result<Project, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(Project {
		id: parse_id(&id, "project id")?,
		name: row.get("name"),
		parent_id: parse_opt_id(row.get("parent_id"), "parent_id")?,
		description: row.get("description"),
		created_at: parse_ts(&created_at, "created_at")?,
		inactive_at: parse_opt_ts(row.get("inactive_at"), "inactive_at")?,
		inactivated_by: parse_opt_id(row.get("inactivated_by"), "inactivated_by")?,
	})
}

fn parse_member_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProjectMember, DbError> {
	let project_id: String = row.get("project_id");
	let user_id: String = row.get("user_id");
	let role_id: String = row.get("role_id");

	Ok(ProjectMember {
		project_id: parse_id(&project_id, "project_id")?,
		user_id: parse_id(&user_id, "user_id")?,
		role_id: parse_id::<RoleId>(&role_id, "role_id")?,
	})
}
