// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Username and password login backed by the `user_credentials` table.

use std::sync::Arc;

use async_trait::async_trait;
use magllama_common_secret::SecretString;
use magllama_server_audit::{AuditEventType, AuditLogger};
use magllama_server_auth::{
	hash_password, verify_password_or_dummy, Credentials, IdentityError, IdentityProvider,
	IdentityProviderKind, UserId,
};
use magllama_server_db::{CredentialStore, UserCredentials};
use serde_json::json;
use tracing::instrument;

use crate::error::{AuthzError, AuthzResult};

#[derive(Clone)]
pub struct PasswordIdentityProvider {
	store: Arc<dyn CredentialStore>,
	audit: AuditLogger,
}

impl PasswordIdentityProvider {
	pub fn new(store: Arc<dyn CredentialStore>, audit: AuditLogger) -> Self {
		Self { store, audit }
	}

	/// Store a login for an externally owned user. Usernames are unique.
	#[instrument(skip(self, password), fields(user_id = %user_id))]
	pub async fn register(
		&self,
		user_id: &UserId,
		username: &str,
		password: &SecretString,
	) -> AuthzResult<UserCredentials> {
		if username.trim().is_empty() {
			return Err(AuthzError::InvalidInput(
				"username must not be empty".to_string(),
			));
		}
		if password.is_empty() {
			return Err(AuthzError::InvalidInput(
				"password must not be empty".to_string(),
			));
		}

		let password_hash = hash_password(password)?;
		Ok(self
			.store
			.create_credentials(user_id, username, &password_hash)
			.await?)
	}

	async fn verify(&self, username: &str, password: &SecretString) -> Result<UserId, IdentityError> {
		let stored = self
			.store
			.get_credentials_by_username(username)
			.await
			.map_err(|e| IdentityError::Internal(e.to_string()))?;

		let valid = verify_password_or_dummy(password, stored.as_ref().map(|c| c.password_hash.as_str()));

		match stored {
			Some(credentials) if valid => {
				self
					.audit
					.log_best_effort(
						Some(credentials.user_id),
						AuditEventType::Login,
						Some(("user", credentials.user_id.to_string())),
						json!({ "username": username, "provider": "password" }),
					)
					.await;
				Ok(credentials.user_id)
			}
			_ => {
				tracing::warn!(username, "login failed");
				self
					.audit
					.log(
						None,
						AuditEventType::LoginFailed,
						None,
						json!({ "username": username, "provider": "password" }),
					)
					.await
					.map_err(|e| IdentityError::Internal(e.to_string()))?;
				Err(IdentityError::InvalidCredentials)
			}
		}
	}
}

#[async_trait]
impl IdentityProvider for PasswordIdentityProvider {
	fn kind(&self) -> IdentityProviderKind {
		IdentityProviderKind::Password
	}

	#[instrument(skip(self, credentials))]
	async fn resolve(&self, credentials: &Credentials) -> Result<UserId, IdentityError> {
		match credentials {
			Credentials::Password { username, password } => self.verify(username, password).await,
			other => Err(IdentityError::WrongProvider {
				expected: IdentityProviderKind::Password,
				got: other.kind(),
			}),
		}
	}
}
