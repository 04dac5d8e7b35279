// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Global permission evaluation.
//!
//! A user holds a permission when some role assigned to them carries it. There
//! is no caching, no precedence and no deny edge; every check is one existence
//! query against the store.

use std::sync::Arc;

use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{PermissionName, UserId};
use magllama_server_db::RbacStore;
use serde_json::json;
use tracing::instrument;

use crate::error::{AuthzError, AuthzResult};

#[derive(Clone)]
pub struct PermissionEvaluator {
	store: Arc<dyn RbacStore>,
	audit: AuditLogger,
}

impl PermissionEvaluator {
	pub fn new(store: Arc<dyn RbacStore>, audit: AuditLogger) -> Self {
		Self { store, audit }
	}

	#[instrument(skip(self, permission), fields(user_id = %user_id, permission = permission.as_ref()))]
	pub async fn has_permission(
		&self,
		user_id: &UserId,
		permission: impl AsRef<str>,
	) -> AuthzResult<bool> {
		Ok(self
			.store
			.has_permission(user_id, permission.as_ref())
			.await?)
	}

	/// Fail with `PermissionDenied` unless `actor` holds `permission`.
	///
	/// The denial is written to the activity log, under the actor when known,
	/// before the error is returned. An absent actor never holds a permission.
	#[instrument(skip(self), fields(actor = ?actor, permission = %permission))]
	pub async fn require_permission(
		&self,
		actor: Option<UserId>,
		permission: PermissionName,
	) -> AuthzResult<()> {
		let granted = match actor {
			Some(user_id) => self.has_permission(&user_id, permission).await?,
			None => false,
		};

		if granted {
			return Ok(());
		}

		tracing::warn!(actor = ?actor, permission = %permission, "permission denied");
		self
			.audit
			.log(
				actor,
				AuditEventType::PermissionDenied,
				None,
				json!({ "permission": permission.as_str() }),
			)
			.await?;

		Err(AuthzError::PermissionDenied {
			permission: permission.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{audit_with_memory, Harness};
	use magllama_server_auth::ErrorKind;

	#[tokio::test]
	async fn granted_permission_passes_without_audit() {
		let h = Harness::new().await;
		let user = UserId::generate();
		h.grant(&user, &[PermissionName::RevealSecret]).await;

		h.permissions
			.require_permission(Some(user), PermissionName::RevealSecret)
			.await
			.unwrap();
		assert!(h.sink.is_empty());
	}

	#[tokio::test]
	async fn denial_is_audited_under_actor() {
		let h = Harness::new().await;
		let user = UserId::generate();

		let err = h
			.permissions
			.require_permission(Some(user), PermissionName::RevealSecret)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::PermissionDenied);

		let entries = h.sink.entries();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].event_type, AuditEventType::PermissionDenied);
		assert_eq!(entries[0].actor_user_id, Some(user));
		assert_eq!(entries[0].details["permission"], "reveal_secret");
	}

	#[tokio::test]
	async fn anonymous_caller_is_denied_and_audited_without_actor() {
		let h = Harness::new().await;
		let err = h
			.permissions
			.require_permission(None, PermissionName::CreateApiKey)
			.await
			.unwrap_err();
		assert!(matches!(err, AuthzError::PermissionDenied { .. }));
		assert_eq!(h.sink.entries()[0].actor_user_id, None);
	}

	#[tokio::test]
	async fn failed_denial_audit_surfaces_as_internal() {
		let h = Harness::with_audit(audit_with_memory(
			magllama_server_audit::MemoryAuditSink::failing_permanently(),
		))
		.await;
		let err = h
			.permissions
			.require_permission(Some(UserId::generate()), PermissionName::RevealSecret)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Internal);
	}

	#[tokio::test]
	async fn removing_the_edge_flips_the_answer() {
		let h = Harness::new().await;
		let user = UserId::generate();
		let role = h.grant(&user, &[PermissionName::RotateSecret]).await;
		assert!(h
			.permissions
			.has_permission(&user, PermissionName::RotateSecret)
			.await
			.unwrap());

		let perm = h
			.rbac
			.get_permission_by_name("rotate_secret")
			.await
			.unwrap()
			.unwrap();
		h.rbac.revoke_permission(&role, &perm.id).await.unwrap();
		assert!(!h
			.permissions
			.has_permission(&user, PermissionName::RotateSecret)
			.await
			.unwrap());
	}
}
