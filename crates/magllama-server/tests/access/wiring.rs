// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `AccessCore::connect` against an on-disk database.

use magllama_common_secret::{Secret, SecretString};
use magllama_server::AccessCore;
use magllama_server_audit::AuditEventType;
use magllama_server_auth::{
	Credentials, ErrorKind, IdentityProvider, IdentityProviderKind, NewProject, NewSecret,
};
use magllama_server_config::{DatabaseConfig, LoggingConfig, SecretsConfig, ServerConfig};
use magllama_server_db::ActivityLogQuery;
use tempfile::TempDir;

use super::support::test_audit_config;

fn config(dir: &TempDir, key: [u8; 32]) -> ServerConfig {
	ServerConfig {
		database: DatabaseConfig {
			url: format!("sqlite:{}", dir.path().join("magllama.db").display()),
			max_connections: 2,
		},
		secrets: SecretsConfig {
			encryption_key: Secret::new(key),
		},
		logging: LoggingConfig::default(),
		audit: test_audit_config(),
	}
}

fn password(value: &str) -> SecretString {
	SecretString::new(value.to_string())
}

#[tokio::test]
async fn bootstrap_admin_can_log_in_and_administer() {
	let dir = TempDir::new().unwrap();
	let core = AccessCore::connect(&config(&dir, [7u8; 32])).await.unwrap();

	let admin = core
		.bootstrap_admin("root", &password("correct horse battery"))
		.await
		.unwrap();

	let resolved = core
		.login(&Credentials::Password {
			username: "root".to_string(),
			password: password("correct horse battery"),
		})
		.await
		.unwrap();
	assert_eq!(resolved, admin);

	let err = core
		.login(&Credentials::Password {
			username: "root".to_string(),
			password: password("wrong"),
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	let failures = core
		.activity
		.query_logs(&ActivityLogQuery {
			action: Some(AuditEventType::LoginFailed),
			..Default::default()
		})
		.await
		.unwrap();
	assert_eq!(failures.len(), 1);

	let project = core
		.projects
		.create_project(
			Some(admin),
			NewProject {
				name: "platform".to_string(),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert!(project.is_active());
}

#[tokio::test]
async fn federated_providers_are_refused() {
	let dir = TempDir::new().unwrap();
	let core = AccessCore::connect(&config(&dir, [7u8; 32])).await.unwrap();

	assert_eq!(
		core.identity_provider(IdentityProviderKind::Ldap).kind(),
		IdentityProviderKind::Ldap
	);
	let err = core
		.login(&Credentials::Ldap {
			username: "root".to_string(),
			password: password("anything"),
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn secrets_survive_reconnect_only_under_the_same_key() {
	let dir = TempDir::new().unwrap();
	let key = [42u8; 32];

	let (admin, secret_id) = {
		let core = AccessCore::connect(&config(&dir, key)).await.unwrap();
		let admin = core
			.bootstrap_admin("root", &password("pw"))
			.await
			.unwrap();
		let record = core
			.vault
			.create(Some(admin), NewSecret::new("webhook", password("whsec_123")))
			.await
			.unwrap();
		core.pool.close().await;
		(admin, record.id)
	};

	let core = AccessCore::connect(&config(&dir, key)).await.unwrap();
	let value = core.vault.reveal(Some(admin), &secret_id).await.unwrap();
	assert_eq!(value.expose(), "whsec_123");
	core.pool.close().await;

	let core = AccessCore::connect(&config(&dir, [43u8; 32])).await.unwrap();
	let err = core.vault.reveal(Some(admin), &secret_id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
}
