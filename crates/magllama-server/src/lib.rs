// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the magllama access core.
//!
//! [`AccessCore`] owns the only shared state in the system: the database pool,
//! the secret cipher and the audit logger. Everything else is a cheap handle
//! built over those three.

use std::sync::Arc;

use magllama_common_secret::SecretString;
use magllama_server_audit::AuditLogger;
use magllama_server_auth::{
	Credentials, IdentityError, IdentityProvider, IdentityProviderKind, PermissionName, RoleId,
	UnsupportedProvider, UserId,
};
use magllama_server_authz::{
	ApiKeyManager, AuthzError, PasswordIdentityProvider, PermissionEvaluator,
	ProjectAccessEvaluator, ProjectService, RbacAdmin,
};
use magllama_server_config::{AuditConfig, ServerConfig};
use magllama_server_db::{
	create_pool, run_migrations, ActivityLogRepository, ApiKeyRepository, CredentialRepository,
	DbError, ProjectRepository, RbacRepository, SecretRepository, SqlitePool,
};
use magllama_server_secrets::{SecretCipher, SecretsVault};

/// Name of the role created by `bootstrap_admin`.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Db(#[from] DbError),

	#[error(transparent)]
	Authz(#[from] AuthzError),
}

#[derive(Clone)]
pub struct AccessCore {
	pub pool: SqlitePool,
	pub audit: AuditLogger,
	pub rbac_store: RbacRepository,
	pub activity: ActivityLogRepository,
	pub permissions: PermissionEvaluator,
	pub project_access: ProjectAccessEvaluator,
	pub api_keys: ApiKeyManager,
	pub projects: ProjectService,
	pub rbac: RbacAdmin,
	pub vault: SecretsVault,
	pub password_login: PasswordIdentityProvider,
}

impl std::fmt::Debug for AccessCore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AccessCore")
			.field("audit", &self.audit)
			.finish_non_exhaustive()
	}
}

impl AccessCore {
	/// Open the database, apply migrations, seed the core permissions and
	/// build every service.
	#[tracing::instrument(skip(config), fields(database = %config.database.url))]
	pub async fn connect(config: &ServerConfig) -> Result<Self, ServerError> {
		let pool = create_pool(&config.database.url, config.database.max_connections).await?;
		run_migrations(&pool).await?;

		let core = Self::from_pool(
			pool,
			Arc::new(SecretCipher::new(&config.secrets.encryption_key)),
			&config.audit,
		);
		let seeded = core.rbac_store.ensure_core_permissions().await?;
		tracing::info!(seeded, "access core ready");
		Ok(core)
	}

	/// Build the services over an already migrated pool.
	pub fn from_pool(pool: SqlitePool, cipher: Arc<SecretCipher>, audit_config: &AuditConfig) -> Self {
		let audit = AuditLogger::for_pool(pool.clone(), audit_config);

		let rbac_store = RbacRepository::new(pool.clone());
		let project_store = ProjectRepository::new(pool.clone());

		let permissions = PermissionEvaluator::new(Arc::new(rbac_store.clone()), audit.clone());
		let project_access =
			ProjectAccessEvaluator::new(Arc::new(project_store.clone()), audit.clone());

		let api_keys = ApiKeyManager::new(
			Arc::new(ApiKeyRepository::new(pool.clone())),
			permissions.clone(),
			project_access.clone(),
			audit.clone(),
		);
		let projects = ProjectService::new(
			Arc::new(project_store),
			Arc::new(rbac_store.clone()),
			permissions.clone(),
			project_access.clone(),
			audit.clone(),
		);
		let rbac = RbacAdmin::new(
			Arc::new(rbac_store.clone()),
			permissions.clone(),
			audit.clone(),
		);
		let vault = SecretsVault::new(
			Arc::new(SecretRepository::new(pool.clone())),
			cipher,
			permissions.clone(),
			project_access.clone(),
			audit.clone(),
		);
		let password_login =
			PasswordIdentityProvider::new(Arc::new(CredentialRepository::new(pool.clone())), audit.clone());

		Self {
			activity: ActivityLogRepository::new(pool.clone()),
			pool,
			audit,
			rbac_store,
			permissions,
			project_access,
			api_keys,
			projects,
			rbac,
			vault,
			password_login,
		}
	}

	/// The provider that handles `kind`. Only password login is implemented;
	/// the federated kinds refuse every attempt.
	pub fn identity_provider(&self, kind: IdentityProviderKind) -> Arc<dyn IdentityProvider> {
		match kind {
			IdentityProviderKind::Password => Arc::new(self.password_login.clone()),
			IdentityProviderKind::OAuth2 => Arc::new(UnsupportedProvider::oauth2()),
			IdentityProviderKind::Ldap => Arc::new(UnsupportedProvider::ldap()),
			IdentityProviderKind::Saml => Arc::new(UnsupportedProvider::saml()),
		}
	}

	pub async fn login(&self, credentials: &Credentials) -> Result<UserId, IdentityError> {
		self
			.identity_provider(credentials.kind())
			.resolve(credentials)
			.await
	}

	/// Create (or reuse) the `admin` role holding every core permission and
	/// assign it to a new user with a password login.
	#[tracing::instrument(skip(self, password))]
	pub async fn bootstrap_admin(
		&self,
		username: &str,
		password: &SecretString,
	) -> Result<UserId, ServerError> {
		let role_id = self.ensure_admin_role().await?;
		let user_id = UserId::generate();
		self
			.password_login
			.register(&user_id, username, password)
			.await?;
		self.rbac_store.assign_role(&user_id, &role_id).await?;
		tracing::info!(%user_id, username, "admin user bootstrapped");
		Ok(user_id)
	}

	async fn ensure_admin_role(&self) -> Result<RoleId, ServerError> {
		let role = match self.rbac_store.get_role_by_name(ADMIN_ROLE).await? {
			Some(role) => role,
			None => {
				self
					.rbac_store
					.create_role(ADMIN_ROLE, Some("All core permissions"))
					.await?
			}
		};
		self.rbac_store.ensure_core_permissions().await?;
		for name in PermissionName::all() {
			if let Some(permission) = self.rbac_store.get_permission_by_name(name.as_str()).await? {
				self
					.rbac_store
					.grant_permission(&role.id, &permission.id)
					.await?;
			}
		}
		Ok(role.id)
	}
}
