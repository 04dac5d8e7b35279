// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission-gated, audited project administration.

use std::sync::Arc;

use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{NewProject, PermissionName, Project, ProjectId, ProjectMember, UserId};
use magllama_server_db::{ProjectStore, RbacStore};
use serde_json::json;
use tracing::instrument;

use crate::error::{AuthzError, AuthzResult};
use crate::permission::PermissionEvaluator;
use crate::project_access::ProjectAccessEvaluator;

#[derive(Clone)]
pub struct ProjectService {
	store: Arc<dyn ProjectStore>,
	rbac: Arc<dyn RbacStore>,
	permissions: PermissionEvaluator,
	project_access: ProjectAccessEvaluator,
	audit: AuditLogger,
}

impl ProjectService {
	pub fn new(
		store: Arc<dyn ProjectStore>,
		rbac: Arc<dyn RbacStore>,
		permissions: PermissionEvaluator,
		project_access: ProjectAccessEvaluator,
		audit: AuditLogger,
	) -> Self {
		Self {
			store,
			rbac,
			permissions,
			project_access,
			audit,
		}
	}

	#[instrument(skip(self, project), fields(actor = ?actor, name = %project.name))]
	pub async fn create_project(
		&self,
		actor: Option<UserId>,
		project: NewProject,
	) -> AuthzResult<Project> {
		self
			.permissions
			.require_permission(actor, PermissionName::CreateProject)
			.await?;

		let name = project.name.trim();
		if name.is_empty() {
			return Err(AuthzError::InvalidInput(
				"project name must not be empty".to_string(),
			));
		}
		if let Some(parent_id) = &project.parent_id {
			if self.store.get_project(parent_id).await?.is_none() {
				return Err(AuthzError::NotFound(format!("parent project {parent_id}")));
			}
		}

		let created = self
			.store
			.create_project(&NewProject {
				name: name.to_string(),
				..project
			})
			.await?;

		self
			.audit
			.log_best_effort(
				actor,
				AuditEventType::CreateProject,
				Some(("project", created.id.to_string())),
				json!({
					"name": created.name,
					"parent_id": created.parent_id.map(|p| p.to_string()),
				}),
			)
			.await;

		Ok(created)
	}

	/// Add a member under a role. `assign_project_role` is an administrative
	/// permission and does not need membership on the target project.
	/// Returns `false` when the membership already existed.
	#[instrument(skip(self), fields(actor = ?actor, project_id = %member.project_id, user_id = %member.user_id))]
	pub async fn add_member(&self, actor: Option<UserId>, member: ProjectMember) -> AuthzResult<bool> {
		self
			.permissions
			.require_permission(actor, PermissionName::AssignProjectRole)
			.await?;

		let project = self
			.store
			.get_project(&member.project_id)
			.await?
			.ok_or_else(|| AuthzError::NotFound(format!("project {}", member.project_id)))?;
		if !project.is_active() {
			return Err(AuthzError::Conflict(format!(
				"project {} is inactive",
				project.id
			)));
		}

		let role = self
			.rbac
			.get_role_by_id(&member.role_id)
			.await?
			.ok_or_else(|| AuthzError::NotFound(format!("role {}", member.role_id)))?;

		let added = self.store.add_member(&member).await?;
		if added {
			self
				.audit
				.log_best_effort(
					actor,
					AuditEventType::AddProjectMember,
					Some(("project", member.project_id.to_string())),
					json!({
						"user_id": member.user_id.to_string(),
						"role": role.name,
					}),
				)
				.await;
		}
		Ok(added)
	}

	pub async fn list_members(
		&self,
		actor: Option<UserId>,
		project_id: &ProjectId,
	) -> AuthzResult<Vec<ProjectMember>> {
		self
			.project_access
			.check_project_access(actor, project_id, None)
			.await?;
		Ok(self.store.list_members(project_id).await?)
	}

	/// Soft-delete a project. Repeating the call is a no-op returning `false`.
	#[instrument(skip(self), fields(actor = ?actor, project_id = %project_id))]
	pub async fn inactivate_project(
		&self,
		actor: Option<UserId>,
		project_id: &ProjectId,
	) -> AuthzResult<bool> {
		self
			.permissions
			.require_permission(actor, PermissionName::InactivateProject)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		let changed = self.store.inactivate_project(project_id, &user_id).await?;
		if changed {
			self
				.audit
				.log_best_effort(
					actor,
					AuditEventType::InactivateProject,
					Some(("project", project_id.to_string())),
					json!({}),
				)
				.await;
		}
		Ok(changed)
	}
}
