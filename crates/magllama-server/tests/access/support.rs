// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use magllama_server::AccessCore;
use magllama_server_audit::{AuditEventType, AuditLogEntry};
use magllama_server_auth::{NewProject, PermissionName, ProjectId, ProjectMember, RoleId, UserId};
use magllama_server_config::AuditConfig;
use magllama_server_db::testing::create_test_pool;
use magllama_server_db::ActivityLogQuery;
use magllama_server_secrets::SecretCipher;

pub fn test_audit_config() -> AuditConfig {
	AuditConfig {
		retry_attempts: 2,
		retry_backoff_ms: 0,
		tracing_sink: false,
	}
}

pub struct TestCore {
	pub core: AccessCore,
}

impl TestCore {
	pub async fn new() -> Self {
		let pool = create_test_pool().await;
		let core = AccessCore::from_pool(
			pool,
			Arc::new(SecretCipher::generate()),
			&test_audit_config(),
		);
		core.rbac_store.ensure_core_permissions().await.unwrap();
		Self { core }
	}

	/// Give `user` a dedicated role holding `permissions`. Returns the role
	/// so tests can take it away again.
	pub async fn grant(&self, user: &UserId, permissions: &[PermissionName]) -> RoleId {
		let role = self
			.core
			.rbac_store
			.create_role(&format!("role-{}", RoleId::generate()), None)
			.await
			.unwrap();
		for name in permissions {
			let permission = self
				.core
				.rbac_store
				.get_permission_by_name(name.as_str())
				.await
				.unwrap()
				.unwrap();
			self
				.core
				.rbac_store
				.grant_permission(&role.id, &permission.id)
				.await
				.unwrap();
		}
		self.core.rbac_store.assign_role(user, &role.id).await.unwrap();
		role.id
	}

	pub async fn user_with(&self, permissions: &[PermissionName]) -> (UserId, RoleId) {
		let user = UserId::generate();
		let role = self.grant(&user, permissions).await;
		(user, role)
	}

	/// Create a project as a throwaway user holding `create_project`.
	pub async fn project(&self, name: &str) -> ProjectId {
		let (admin, _) = self.user_with(&[PermissionName::CreateProject]).await;
		self
			.core
			.projects
			.create_project(
				Some(admin),
				NewProject {
					name: name.to_string(),
					..Default::default()
				},
			)
			.await
			.unwrap()
			.id
	}

	/// Add `user` to `project` under a `member` role, acting as a throwaway
	/// administrator.
	pub async fn join(&self, user: &UserId, project: &ProjectId) {
		let (admin, _) = self.user_with(&[PermissionName::AssignProjectRole]).await;
		let role_id = match self.core.rbac_store.get_role_by_name("member").await.unwrap() {
			Some(role) => role.id,
			None => self.core.rbac_store.create_role("member", None).await.unwrap().id,
		};
		self
			.core
			.projects
			.add_member(
				Some(admin),
				ProjectMember {
					project_id: *project,
					user_id: *user,
					role_id,
				},
			)
			.await
			.unwrap();
	}

	pub async fn activity(&self, user: Option<UserId>, action: AuditEventType) -> Vec<AuditLogEntry> {
		self
			.core
			.activity
			.query_logs(&ActivityLogQuery {
				user_id: user,
				action: Some(action),
				..Default::default()
			})
			.await
			.unwrap()
	}
}
