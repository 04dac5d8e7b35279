// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixtures shared by this crate's tests and downstream integration tests.

use std::sync::Arc;

use magllama_server_audit::{AuditLogger, MemoryAuditSink};
use magllama_server_auth::{NewProject, PermissionName, ProjectId, ProjectMember, RoleId, UserId};
use magllama_server_config::AuditConfig;
use magllama_server_db::testing::create_test_pool;
use magllama_server_db::{ProjectRepository, RbacRepository, SqlitePool};

use crate::permission::PermissionEvaluator;
use crate::project_access::ProjectAccessEvaluator;

/// A logger that writes only to `sink`, without retry delays.
pub fn audit_with_memory(sink: MemoryAuditSink) -> (Arc<MemoryAuditSink>, AuditLogger) {
	let sink = Arc::new(sink);
	let config = AuditConfig {
		retry_attempts: 2,
		retry_backoff_ms: 0,
		tracing_sink: false,
	};
	let logger = AuditLogger::new(vec![sink.clone()], &config);
	(sink, logger)
}

/// In-memory database, memory audit sink and both evaluators.
pub struct Harness {
	pub pool: SqlitePool,
	pub rbac: RbacRepository,
	pub projects: ProjectRepository,
	pub sink: Arc<MemoryAuditSink>,
	pub audit: AuditLogger,
	pub permissions: PermissionEvaluator,
	pub project_access: ProjectAccessEvaluator,
}

impl Harness {
	pub async fn new() -> Self {
		Self::with_audit(audit_with_memory(MemoryAuditSink::new())).await
	}

	pub async fn with_audit((sink, audit): (Arc<MemoryAuditSink>, AuditLogger)) -> Self {
		let pool = create_test_pool().await;
		let rbac = RbacRepository::new(pool.clone());
		let projects = ProjectRepository::new(pool.clone());
		rbac.ensure_core_permissions().await.unwrap();

		Self {
			permissions: PermissionEvaluator::new(Arc::new(rbac.clone()), audit.clone()),
			project_access: ProjectAccessEvaluator::new(Arc::new(projects.clone()), audit.clone()),
			pool,
			rbac,
			projects,
			sink,
			audit,
		}
	}

	/// Give `user` a fresh role carrying `permissions`. Returns the role.
	pub async fn grant(&self, user: &UserId, permissions: &[PermissionName]) -> RoleId {
		let role = self
			.rbac
			.create_role(&format!("role-{}", RoleId::generate()), None)
			.await
			.unwrap();
		for permission in permissions {
			let permission = self
				.rbac
				.get_permission_by_name(permission.as_str())
				.await
				.unwrap()
				.unwrap();
			self
				.rbac
				.grant_permission(&role.id, &permission.id)
				.await
				.unwrap();
		}
		self.rbac.assign_role(user, &role.id).await.unwrap();
		role.id
	}

	/// Look up a role by name, creating it on first use.
	pub async fn role(&self, name: &str) -> RoleId {
		match self.rbac.get_role_by_name(name).await.unwrap() {
			Some(role) => role.id,
			None => self.rbac.create_role(name, None).await.unwrap().id,
		}
	}

	pub async fn project(&self, name: &str) -> ProjectId {
		self
			.projects
			.create_project(&NewProject {
				name: name.to_string(),
				..Default::default()
			})
			.await
			.unwrap()
			.id
	}

	/// Make `user` a member of `project` under `role_name`.
	pub async fn join(&self, user: &UserId, project: &ProjectId, role_name: &str) {
		let role_id = self.role(role_name).await;
		self
			.projects
			.add_member(&ProjectMember {
				project_id: *project,
				user_id: *user,
				role_id,
			})
			.await
			.unwrap();
	}
}
