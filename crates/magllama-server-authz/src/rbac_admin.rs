// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{PermissionName, RoleId, UserId};
use magllama_server_db::RbacStore;
use serde_json::json;
use tracing::instrument;

use crate::error::{AuthzError, AuthzResult};
use crate::permission::PermissionEvaluator;

/// Global role assignment, gated by `assign_role`.
///
/// Role and permission definitions are managed directly through the store by
/// bootstrap tooling.
#[derive(Clone)]
pub struct RbacAdmin {
	store: Arc<dyn RbacStore>,
	permissions: PermissionEvaluator,
	audit: AuditLogger,
}

impl RbacAdmin {
	pub fn new(store: Arc<dyn RbacStore>, permissions: PermissionEvaluator, audit: AuditLogger) -> Self {
		Self {
			store,
			permissions,
			audit,
		}
	}

	#[instrument(skip(self), fields(actor = ?actor, user_id = %user_id, role_id = %role_id))]
	pub async fn assign_role(
		&self,
		actor: Option<UserId>,
		user_id: &UserId,
		role_id: &RoleId,
	) -> AuthzResult<bool> {
		self
			.permissions
			.require_permission(actor, PermissionName::AssignRole)
			.await?;
		let role = self
			.store
			.get_role_by_id(role_id)
			.await?
			.ok_or_else(|| AuthzError::NotFound(format!("role {role_id}")))?;

		let assigned = self.store.assign_role(user_id, role_id).await?;
		if assigned {
			self
				.audit
				.log_best_effort(
					actor,
					AuditEventType::RoleAssigned,
					Some(("user", user_id.to_string())),
					json!({ "role": role.name }),
				)
				.await;
		}
		Ok(assigned)
	}

	#[instrument(skip(self), fields(actor = ?actor, user_id = %user_id, role_id = %role_id))]
	pub async fn unassign_role(
		&self,
		actor: Option<UserId>,
		user_id: &UserId,
		role_id: &RoleId,
	) -> AuthzResult<bool> {
		self
			.permissions
			.require_permission(actor, PermissionName::AssignRole)
			.await?;

		let removed = self.store.unassign_role(user_id, role_id).await?;
		if removed {
			self
				.audit
				.log_best_effort(
					actor,
					AuditEventType::RoleUnassigned,
					Some(("user", user_id.to_string())),
					json!({ "role_id": role_id.to_string() }),
				)
				.await;
		}
		Ok(removed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::Harness;
	use magllama_server_auth::ErrorKind;

	#[tokio::test]
	async fn assignment_is_gated_idempotent_and_audited() {
		let h = Harness::new().await;
		let admin = UserId::generate();
		let target = UserId::generate();
		let rbac = RbacAdmin::new(Arc::new(h.rbac.clone()), h.permissions.clone(), h.audit.clone());
		let role = h.role("auditor").await;

		let err = rbac
			.assign_role(Some(target), &target, &role)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::PermissionDenied);

		h.grant(&admin, &[PermissionName::AssignRole]).await;
		assert!(rbac.assign_role(Some(admin), &target, &role).await.unwrap());
		assert!(!rbac.assign_role(Some(admin), &target, &role).await.unwrap());
		assert_eq!(h.sink.count_of(AuditEventType::RoleAssigned), 1);

		assert!(rbac.unassign_role(Some(admin), &target, &role).await.unwrap());
		assert!(!rbac.unassign_role(Some(admin), &target, &role).await.unwrap());
		assert_eq!(h.sink.count_of(AuditEventType::RoleUnassigned), 1);
	}

	#[tokio::test]
	async fn unknown_role_is_not_found() {
		let h = Harness::new().await;
		let admin = UserId::generate();
		h.grant(&admin, &[PermissionName::AssignRole]).await;
		let rbac = RbacAdmin::new(Arc::new(h.rbac.clone()), h.permissions.clone(), h.audit.clone());

		let err = rbac
			.assign_role(Some(admin), &UserId::generate(), &RoleId::generate())
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}
}
