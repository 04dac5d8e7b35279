// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project-scoped access evaluation.
//!
//! Membership on a project, optionally with a named role, is the only thing
//! that grants access to project-scoped resources. Global permissions never
//! substitute for membership.

use std::sync::Arc;

use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{ProjectId, UserId};
use magllama_server_db::ProjectStore;
use serde_json::json;
use tracing::instrument;

use crate::error::{AuthzError, AuthzResult};

#[derive(Clone)]
pub struct ProjectAccessEvaluator {
	store: Arc<dyn ProjectStore>,
	audit: AuditLogger,
}

impl ProjectAccessEvaluator {
	pub fn new(store: Arc<dyn ProjectStore>, audit: AuditLogger) -> Self {
		Self { store, audit }
	}

	/// True when `user_id` is a member of the active project `project_id`,
	/// holding `required_role` when one is given.
	#[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
	pub async fn has_project_access(
		&self,
		user_id: &UserId,
		project_id: &ProjectId,
		required_role: Option<&str>,
	) -> AuthzResult<bool> {
		Ok(self
			.store
			.has_project_access(user_id, project_id, required_role)
			.await?)
	}

	/// Fail with `AccessDenied` unless `actor` has access to the project.
	///
	/// Denials are recorded as `project_access_denied` before returning.
	#[instrument(skip(self), fields(actor = ?actor, project_id = %project_id))]
	pub async fn check_project_access(
		&self,
		actor: Option<UserId>,
		project_id: &ProjectId,
		required_role: Option<&str>,
	) -> AuthzResult<()> {
		let granted = match actor {
			Some(user_id) => {
				self
					.has_project_access(&user_id, project_id, required_role)
					.await?
			}
			None => false,
		};

		if granted {
			return Ok(());
		}

		tracing::warn!(actor = ?actor, %project_id, ?required_role, "project access denied");

		let mut details = json!({ "project_id": project_id.to_string() });
		if let Some(role) = required_role {
			details["required_role"] = json!(role);
		}
		self
			.audit
			.log(
				actor,
				AuditEventType::ProjectAccessDenied,
				Some(("project", project_id.to_string())),
				details,
			)
			.await?;

		Err(AuthzError::AccessDenied {
			resource: format!("project {project_id}"),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::Harness;
	use magllama_server_auth::{ErrorKind, NewProject, ProjectMember};
	use magllama_server_db::ProjectRepository;

	#[tokio::test]
	async fn member_passes_and_outsider_is_denied() {
		let h = Harness::new().await;
		let project = h.project("Alpha").await;
		let member = UserId::generate();
		h.join(&member, &project, "viewer").await;

		h.project_access
			.check_project_access(Some(member), &project, None)
			.await
			.unwrap();
		assert!(h.sink.is_empty());

		let outsider = UserId::generate();
		let err = h
			.project_access
			.check_project_access(Some(outsider), &project, None)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::AccessDenied);

		let entries = h.sink.entries();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].event_type, AuditEventType::ProjectAccessDenied);
		assert_eq!(entries[0].details["project_id"], project.to_string());
		assert!(entries[0].details.get("required_role").is_none());
	}

	#[tokio::test]
	async fn required_role_is_checked_and_recorded() {
		let h = Harness::new().await;
		let project = h.project("Beta").await;
		let user = UserId::generate();
		h.join(&user, &project, "viewer").await;

		assert!(h
			.project_access
			.has_project_access(&user, &project, Some("viewer"))
			.await
			.unwrap());

		let err = h
			.project_access
			.check_project_access(Some(user), &project, Some("admin"))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthzError::AccessDenied { .. }));
		assert_eq!(h.sink.entries()[0].details["required_role"], "admin");
	}

	#[tokio::test]
	async fn global_permissions_do_not_grant_project_access() {
		let h = Harness::new().await;
		let project = h.project("Gamma").await;
		let admin = UserId::generate();
		h.grant(&admin, magllama_server_auth::PermissionName::all())
			.await;

		assert!(!h
			.project_access
			.has_project_access(&admin, &project, None)
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn inactive_project_denies_members() {
		let h = Harness::new().await;
		let projects = ProjectRepository::new(h.pool.clone());
		let project = projects
			.create_project(&NewProject {
				name: "Delta".to_string(),
				..Default::default()
			})
			.await
			.unwrap()
			.id;
		let user = UserId::generate();
		let role = h.role("member").await;
		projects
			.add_member(&ProjectMember {
				project_id: project,
				user_id: user,
				role_id: role,
			})
			.await
			.unwrap();
		projects.inactivate_project(&project, &user).await.unwrap();

		assert!(h
			.project_access
			.check_project_access(Some(user), &project, None)
			.await
			.is_err());
	}

	#[tokio::test]
	async fn anonymous_caller_is_denied() {
		let h = Harness::new().await;
		let project = h.project("Epsilon").await;
		assert!(h
			.project_access
			.check_project_access(None, &project, None)
			.await
			.is_err());
		assert_eq!(h.sink.entries()[0].actor_user_id, None);
	}
}
