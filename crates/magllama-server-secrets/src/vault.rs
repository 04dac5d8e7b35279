// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The secrets vault.
//!
//! Lifecycle: `active` stays `active` across rotation, `revoke` is terminal,
//! and a passed `expires_at` makes the secret read-only without any
//! background sweep: reveal, update and rotate refuse with `Conflict`.
//!
//! Every operation on an existing secret first passes the ownership gate. A
//! user secret admits only its owner, anyone else getting `AccessDenied`
//! recorded as `secret_access_denied`. A project secret goes through the
//! project access check, so outsiders are recorded as
//! `project_access_denied` against the project. The global permission for
//! the operation is checked after the gate.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use magllama_common_secret::SecretString;
use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{
	NewSecret, PermissionName, ProjectId, SecretId, SecretOwner, SecretRecord, SecretStatus,
	SecretUpdate, UserId, DEFAULT_SECRET_TYPE,
};
use magllama_server_authz::{AuthzError, PermissionEvaluator, ProjectAccessEvaluator};
use magllama_server_db::{SecretChanges, SecretStore, Transition};
use serde_json::json;
use tracing::instrument;

use crate::encryption::SecretCipher;
use crate::error::{SecretsError, SecretsResult};

const RESOURCE: &str = "secret";

#[derive(Clone)]
pub struct SecretsVault {
	store: Arc<dyn SecretStore>,
	cipher: Arc<SecretCipher>,
	permissions: PermissionEvaluator,
	project_access: ProjectAccessEvaluator,
	audit: AuditLogger,
}

impl SecretsVault {
	pub fn new(
		store: Arc<dyn SecretStore>,
		cipher: Arc<SecretCipher>,
		permissions: PermissionEvaluator,
		project_access: ProjectAccessEvaluator,
		audit: AuditLogger,
	) -> Self {
		Self {
			store,
			cipher,
			permissions,
			project_access,
			audit,
		}
	}

	/// Store a new secret owned by the caller, or by `project_id` when set.
	#[instrument(skip(self, new), fields(actor = ?actor, project_id = ?new.project_id))]
	pub async fn create(&self, actor: Option<UserId>, new: NewSecret) -> SecretsResult<SecretRecord> {
		let owner = match new.project_id {
			Some(project_id) => {
				self
					.permissions
					.require_permission(actor, PermissionName::CreateProjectSecret)
					.await?;
				self
					.project_access
					.check_project_access(actor, &project_id, None)
					.await?;
				SecretOwner::Project(project_id)
			}
			None => {
				self
					.permissions
					.require_permission(actor, PermissionName::CreateUserSecret)
					.await?;
				SecretOwner::User(actor.ok_or(AuthzError::Unauthorized)?)
			}
		};
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		let name = validate_name(&new.name)?;
		let now = now();
		if new.expires_at.is_some_and(|exp| exp <= now) {
			return Err(SecretsError::InvalidInput(
				"expires_at must be in the future".to_string(),
			));
		}

		let id = SecretId::generate();
		let value = self.cipher.seal(&id, &new.value)?;
		let record = SecretRecord {
			id,
			name,
			owner,
			created_by: user_id,
			created_at: now,
			updated_at: now,
			updated_by: user_id,
			rotated_at: None,
			revoked_at: None,
			revoked_by: None,
			expires_at: new.expires_at.map(|exp| exp.trunc_subsecs(6)),
			description: new.description,
			secret_type: new
				.secret_type
				.unwrap_or_else(|| DEFAULT_SECRET_TYPE.to_string()),
			metadata: new.metadata,
		};
		self.store.insert_secret(&record, &value).await?;

		tracing::info!(secret_id = %record.id, owner = ?record.owner, "secret created");
		self
			.audit
			.log_best_effort(
				actor,
				AuditEventType::CreateSecret,
				Some((RESOURCE, record.id.to_string())),
				json!({ "name": record.name, "owner": owner_label(&record.owner) }),
			)
			.await;

		Ok(record)
	}

	/// Metadata of a secret the caller may see. Never includes the value.
	#[instrument(skip(self), fields(actor = ?actor, secret_id = %id))]
	pub async fn get(&self, actor: Option<UserId>, id: &SecretId) -> SecretsResult<SecretRecord> {
		let record = self.load(id).await?;
		self.authorize(actor, &record).await?;

		self
			.audit
			.log_best_effort(
				actor,
				AuditEventType::GetSecret,
				Some((RESOURCE, id.to_string())),
				json!({ "name": record.name }),
			)
			.await;
		Ok(record)
	}

	/// Decrypt and return the value.
	///
	/// The `reveal_secret` entry is written before the value is returned; if
	/// it cannot be written the value is withheld.
	#[instrument(skip(self), fields(actor = ?actor, secret_id = %id))]
	pub async fn reveal(&self, actor: Option<UserId>, id: &SecretId) -> SecretsResult<SecretString> {
		let (record, stored) = self
			.store
			.get_secret_with_ciphertext(id)
			.await?
			.ok_or_else(|| SecretsError::NotFound(id.to_string()))?;
		self.authorize(actor, &record).await?;
		self
			.permissions
			.require_permission(actor, PermissionName::RevealSecret)
			.await?;

		match record.status() {
			SecretStatus::Active => {}
			SecretStatus::Revoked => {
				return Err(SecretsError::Conflict(format!("secret {id} is revoked")))
			}
			SecretStatus::Expired => {
				return Err(SecretsError::Conflict(format!("secret {id} has expired")))
			}
		}

		let value = self.cipher.open(id, &stored)?;

		self
			.audit
			.log(
				actor,
				AuditEventType::RevealSecret,
				Some((RESOURCE, id.to_string())),
				json!({ "name": record.name }),
			)
			.await?;

		Ok(value)
	}

	/// Apply a partial update. A new value is re-encrypted under a fresh
	/// nonce. Revoked and expired secrets refuse with `Conflict`; the expiry
	/// guard applies to the stored `expires_at`, so an expired secret cannot
	/// be revived by moving it forward.
	#[instrument(skip(self, update), fields(actor = ?actor, secret_id = %id))]
	pub async fn update(
		&self,
		actor: Option<UserId>,
		id: &SecretId,
		update: SecretUpdate,
	) -> SecretsResult<SecretRecord> {
		let record = self.load(id).await?;
		self.authorize(actor, &record).await?;
		let permission = match record.owner {
			SecretOwner::User(_) => PermissionName::UpdateUserSecret,
			SecretOwner::Project(_) => PermissionName::UpdateProjectSecret,
		};
		self
			.permissions
			.require_permission(actor, permission)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		if update.is_empty() {
			return Err(SecretsError::InvalidInput("no changes given".to_string()));
		}

		let mut fields: Vec<&str> = Vec::new();
		if update.name.is_some() {
			fields.push("name");
		}
		if update.description.is_some() {
			fields.push("description");
		}
		if update.secret_type.is_some() {
			fields.push("secret_type");
		}
		if update.expires_at.is_some() {
			fields.push("expires_at");
		}
		if update.metadata.is_some() {
			fields.push("metadata");
		}
		let value_changed = update.value.is_some();

		let changes = SecretChanges {
			name: update.name.as_deref().map(validate_name).transpose()?,
			description: update.description,
			secret_type: update.secret_type,
			expires_at: update.expires_at,
			metadata: update.metadata,
			value: update
				.value
				.as_ref()
				.map(|v| self.cipher.seal(id, v))
				.transpose()?,
		};

		let transition = self
			.store
			.update_secret(id, &changes, &user_id, now())
			.await?;
		self.expect_applied(id, transition)?;

		self
			.audit
			.log_best_effort(
				actor,
				AuditEventType::UpdateSecret,
				Some((RESOURCE, id.to_string())),
				json!({ "fields": fields, "value_changed": value_changed }),
			)
			.await;

		self.load(id).await
	}

	/// Replace the value. `rotated_at` and `updated_at` are set to the same
	/// instant.
	#[instrument(skip(self, new_value), fields(actor = ?actor, secret_id = %id))]
	pub async fn rotate(
		&self,
		actor: Option<UserId>,
		id: &SecretId,
		new_value: SecretString,
	) -> SecretsResult<SecretRecord> {
		let record = self.load(id).await?;
		self.authorize(actor, &record).await?;
		self
			.permissions
			.require_permission(actor, PermissionName::RotateSecret)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		let stored = self.cipher.seal(id, &new_value)?;
		let transition = self
			.store
			.rotate_secret(id, &stored, &user_id, now())
			.await?;
		self.expect_applied(id, transition)?;

		tracing::info!(secret_id = %id, "secret rotated");
		self
			.audit
			.log_best_effort(
				actor,
				AuditEventType::RotateSecret,
				Some((RESOURCE, id.to_string())),
				json!({ "name": record.name }),
			)
			.await;

		self.load(id).await
	}

	/// Permanently revoke. A second revoke is a `Conflict`.
	#[instrument(skip(self), fields(actor = ?actor, secret_id = %id))]
	pub async fn revoke(&self, actor: Option<UserId>, id: &SecretId) -> SecretsResult<SecretRecord> {
		let record = self.load(id).await?;
		self.authorize(actor, &record).await?;
		self
			.permissions
			.require_permission(actor, PermissionName::RevokeSecret)
			.await?;
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;

		let transition = self.store.revoke_secret(id, &user_id, now()).await?;
		self.expect_applied(id, transition)?;

		tracing::info!(secret_id = %id, "secret revoked");
		self
			.audit
			.log_best_effort(
				actor,
				AuditEventType::RevokeSecret,
				Some((RESOURCE, id.to_string())),
				json!({ "name": record.name }),
			)
			.await;

		self.load(id).await
	}

	pub async fn list_for_user(&self, actor: Option<UserId>) -> SecretsResult<Vec<SecretRecord>> {
		let user_id = actor.ok_or(AuthzError::Unauthorized)?;
		Ok(self.store.list_secrets_for_user(&user_id).await?)
	}

	pub async fn list_for_project(
		&self,
		actor: Option<UserId>,
		project_id: &ProjectId,
	) -> SecretsResult<Vec<SecretRecord>> {
		self
			.project_access
			.check_project_access(actor, project_id, None)
			.await?;
		Ok(self.store.list_secrets_for_project(project_id).await?)
	}

	async fn load(&self, id: &SecretId) -> SecretsResult<SecretRecord> {
		self
			.store
			.get_secret(id)
			.await?
			.ok_or_else(|| SecretsError::NotFound(id.to_string()))
	}

	async fn authorize(&self, actor: Option<UserId>, record: &SecretRecord) -> SecretsResult<()> {
		let owner = match record.owner {
			SecretOwner::Project(project_id) => {
				self
					.project_access
					.check_project_access(actor, &project_id, None)
					.await?;
				return Ok(());
			}
			SecretOwner::User(owner) => owner,
		};
		if actor == Some(owner) {
			return Ok(());
		}

		tracing::warn!(actor = ?actor, secret_id = %record.id, "secret access denied");
		self
			.audit
			.log(
				actor,
				AuditEventType::SecretAccessDenied,
				Some((RESOURCE, record.id.to_string())),
				json!({ "secret_id": record.id.to_string(), "owner": owner_label(&record.owner) }),
			)
			.await?;

		Err(AuthzError::AccessDenied {
			resource: format!("secret {}", record.id),
		}
		.into())
	}

	fn expect_applied(&self, id: &SecretId, transition: Transition) -> SecretsResult<()> {
		match transition {
			Transition::Applied => Ok(()),
			Transition::Revoked => Err(SecretsError::Conflict(format!("secret {id} is revoked"))),
			Transition::Expired => Err(SecretsError::Conflict(format!("secret {id} has expired"))),
			Transition::NotFound => Err(SecretsError::NotFound(id.to_string())),
		}
	}
}

fn now() -> DateTime<Utc> {
	Utc::now().trunc_subsecs(6)
}

fn validate_name(name: &str) -> SecretsResult<String> {
	let name = name.trim();
	if name.is_empty() {
		return Err(SecretsError::InvalidInput(
			"secret name must not be empty".to_string(),
		));
	}
	Ok(name.to_string())
}

fn owner_label(owner: &SecretOwner) -> &'static str {
	match owner {
		SecretOwner::User(_) => "user",
		SecretOwner::Project(_) => "project",
	}
}
