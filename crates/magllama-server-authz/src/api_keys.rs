// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Issue, authenticate and revoke long-lived bearer credentials.
//!
//! Only the SHA-256 digest of a token is stored. The plaintext token leaves
//! this module exactly once, inside [`IssuedApiKey`].

use std::sync::Arc;

use chrono::Utc;
use magllama_common_secret::SecretString;
use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{
	generate_api_key_token, hash_api_key, is_well_formed_token, ApiKey, ApiKeyId, PermissionName,
	ProjectId, UserId, ISSUED_KEY_CACHE_CONTROL,
};
use magllama_server_db::{ApiKeyStore, LastUsed, NewApiKey};
use serde_json::json;
use tracing::instrument;

use crate::error::{AuthzError, AuthzResult};
use crate::permission::PermissionEvaluator;
use crate::project_access::ProjectAccessEvaluator;

/// Result of issuing a key. `token` is the only copy of the plaintext;
/// responses carrying it must not be cached.
#[derive(Debug)]
pub struct IssuedApiKey {
	pub token: SecretString,
	pub key: ApiKey,
	pub cache_control: &'static str,
}

/// Extracts the token from a "Bearer <token>" Authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
	auth_header.strip_prefix("Bearer ")
}

#[derive(Clone)]
pub struct ApiKeyManager {
	store: Arc<dyn ApiKeyStore>,
	permissions: PermissionEvaluator,
	project_access: ProjectAccessEvaluator,
	audit: AuditLogger,
}

impl ApiKeyManager {
	pub fn new(
		store: Arc<dyn ApiKeyStore>,
		permissions: PermissionEvaluator,
		project_access: ProjectAccessEvaluator,
		audit: AuditLogger,
	) -> Self {
		Self {
			store,
			permissions,
			project_access,
			audit,
		}
	}

	/// Issue a key scoped to the calling user.
	#[instrument(skip(self, description), fields(actor = ?actor))]
	pub async fn issue_user_key(
		&self,
		actor: Option<UserId>,
		description: Option<&str>,
	) -> AuthzResult<IssuedApiKey> {
		self
			.permissions
			.require_permission(actor, PermissionName::CreateApiKey)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		self.issue(user_id, None, description).await
	}

	/// Issue a key scoped to `project_id`. The caller needs the global
	/// permission first, then membership on the project.
	#[instrument(skip(self, description), fields(actor = ?actor, project_id = %project_id))]
	pub async fn issue_project_key(
		&self,
		actor: Option<UserId>,
		project_id: &ProjectId,
		description: Option<&str>,
	) -> AuthzResult<IssuedApiKey> {
		self
			.permissions
			.require_permission(actor, PermissionName::CreateProjectApiKey)
			.await?;
		self
			.project_access
			.check_project_access(actor, project_id, None)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		self.issue(user_id, Some(*project_id), description).await
	}

	async fn issue(
		&self,
		user_id: UserId,
		project_id: Option<ProjectId>,
		description: Option<&str>,
	) -> AuthzResult<IssuedApiKey> {
		let token = generate_api_key_token();
		let key_hash = hash_api_key(token.expose());

		let key = self
			.store
			.create_api_key(NewApiKey {
				user_id: Some(user_id),
				project_id,
				key_hash: &key_hash,
				description,
			})
			.await?;

		tracing::info!(api_key_id = %key.id, user_id = %user_id, project_id = ?project_id, "API key issued");
		self
			.audit
			.log_best_effort(
				Some(user_id),
				AuditEventType::ApiKeyCreated,
				Some(("api_key", key.id.to_string())),
				json!({
					"scope": if project_id.is_some() { "project" } else { "user" },
					"project_id": project_id.map(|p| p.to_string()),
				}),
			)
			.await;

		Ok(IssuedApiKey {
			token,
			key,
			cache_control: ISSUED_KEY_CACHE_CONTROL,
		})
	}

	/// Resolve a presented token to its active key.
	///
	/// Malformed, unknown and revoked tokens all fail with the same
	/// `Unauthorized` error. A successful lookup advances `last_used_at`; a
	/// key revoked between the lookup and that update is rejected.
	#[instrument(skip(self, token))]
	pub async fn authenticate(&self, token: &str) -> AuthzResult<ApiKey> {
		if !is_well_formed_token(token) {
			return self.reject("malformed").await;
		}

		let key_hash = hash_api_key(token);
		let Some(mut key) = self.store.get_active_api_key_by_hash(&key_hash).await? else {
			return self.reject("no_active_key").await;
		};

		let now = Utc::now();
		match self.store.touch_last_used(&key.id, now).await? {
			LastUsed::Moved => key.last_used_at = Some(now),
			LastUsed::Unchanged => {}
			LastUsed::Inactive => return self.reject("no_active_key").await,
		}

		tracing::debug!(api_key_id = %key.id, "API key authenticated");
		Ok(key)
	}

	async fn reject<T>(&self, reason: &'static str) -> AuthzResult<T> {
		tracing::warn!(reason, "API key authentication failed");
		self
			.audit
			.log(
				None,
				AuditEventType::ApiKeyAuthFailed,
				None,
				json!({ "reason": reason }),
			)
			.await?;
		Err(AuthzError::Unauthorized)
	}

	/// Deactivate a key. Revoking an inactive key is a no-op that returns
	/// `false`; an unknown id is `NotFound`.
	#[instrument(skip(self), fields(actor = ?actor, api_key_id = %api_key_id))]
	pub async fn revoke(&self, actor: Option<UserId>, api_key_id: &ApiKeyId) -> AuthzResult<bool> {
		self
			.permissions
			.require_permission(actor, PermissionName::DeactivateApiKey)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		let revoked = self.store.revoke_api_key(api_key_id, &user_id).await?;
		if revoked {
			self
				.audit
				.log_best_effort(
					Some(user_id),
					AuditEventType::ApiKeyRevoked,
					Some(("api_key", api_key_id.to_string())),
					json!({}),
				)
				.await;
		}
		Ok(revoked)
	}

	/// The caller's own user-scoped keys, active and inactive.
	pub async fn list_user_keys(&self, actor: Option<UserId>) -> AuthzResult<Vec<ApiKey>> {
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;
		Ok(self.store.list_api_keys_for_user(&user_id).await?)
	}

	pub async fn list_project_keys(
		&self,
		actor: Option<UserId>,
		project_id: &ProjectId,
	) -> AuthzResult<Vec<ApiKey>> {
		self
			.project_access
			.check_project_access(actor, project_id, None)
			.await?;
		Ok(self.store.list_api_keys_for_project(project_id).await?)
	}
}
