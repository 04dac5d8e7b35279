// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end flows across permissions, project membership, the vault and
//! API keys.

use magllama_common_secret::SecretString;
use magllama_server_audit::AuditEventType;
use magllama_server_auth::{ErrorKind, NewSecret, PermissionName, SecretOwner};

use super::support::TestCore;

fn secret(value: &str) -> SecretString {
	SecretString::new(value.to_string())
}

#[tokio::test]
async fn owner_without_roles_cannot_reveal_own_secret() {
	let t = TestCore::new().await;
	let (user, role) = t.user_with(&[PermissionName::CreateUserSecret]).await;
	let record = t
		.core
		.vault
		.create(Some(user), NewSecret::new("api_token", secret("s3cr3t")))
		.await
		.unwrap();

	t.core.rbac_store.unassign_role(&user, &role).await.unwrap();

	let err = t.core.vault.reveal(Some(user), &record.id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::PermissionDenied);

	let denials = t.activity(Some(user), AuditEventType::PermissionDenied).await;
	assert_eq!(denials.len(), 1);
	assert_eq!(
		denials[0].details["permission"],
		PermissionName::RevealSecret.as_str()
	);
	assert!(t
		.activity(Some(user), AuditEventType::RevealSecret)
		.await
		.is_empty());
}

#[tokio::test]
async fn project_secret_becomes_visible_after_joining() {
	let t = TestCore::new().await;
	let project = t.project("payments").await;
	let (admin, _) = t
		.user_with(&[PermissionName::CreateProjectSecret, PermissionName::RevealSecret])
		.await;
	t.join(&admin, &project).await;

	let record = t
		.core
		.vault
		.create(
			Some(admin),
			NewSecret::new("db_pass", secret("p@ss")).for_project(project),
		)
		.await
		.unwrap();

	let (viewer, _) = t.user_with(&[PermissionName::RevealSecret]).await;
	let err = t.core.vault.get(Some(viewer), &record.id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::AccessDenied);
	let denials = t
		.activity(Some(viewer), AuditEventType::ProjectAccessDenied)
		.await;
	assert_eq!(denials.len(), 1);
	assert_eq!(denials[0].resource_id, Some(project.to_string()));
	assert_eq!(denials[0].details["project_id"], project.to_string());

	t.join(&viewer, &project).await;

	let seen = t.core.vault.get(Some(viewer), &record.id).await.unwrap();
	assert_eq!(seen.name, "db_pass");
	assert_eq!(seen.owner, SecretOwner::Project(project));
	assert_eq!(seen.created_by, admin);

	let value = t.core.vault.reveal(Some(viewer), &record.id).await.unwrap();
	assert_eq!(value.expose(), "p@ss");

	let listed = t
		.core
		.vault
		.list_for_project(Some(viewer), &project)
		.await
		.unwrap();
	assert_eq!(listed.len(), 1);
	assert_eq!(listed[0].id, record.id);
}

#[tokio::test]
async fn project_api_key_authenticates_and_rejects_tampering() {
	let t = TestCore::new().await;
	let project = t.project("ingest").await;
	let (admin, _) = t.user_with(&[PermissionName::CreateProjectApiKey]).await;
	t.join(&admin, &project).await;

	let issued = t
		.core
		.api_keys
		.issue_project_key(Some(admin), &project, Some("ci"))
		.await
		.unwrap();

	let key = t
		.core
		.api_keys
		.authenticate(issued.token.expose())
		.await
		.unwrap();
	assert_eq!(key.id, issued.key.id);
	assert_eq!(key.project_id, Some(project));

	let mut tampered = issued.token.expose().clone().into_bytes();
	let last = tampered.len() - 1;
	tampered[last] ^= 0x01;
	let tampered = String::from_utf8(tampered).unwrap();

	let err = t.core.api_keys.authenticate(&tampered).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	assert_eq!(
		t.activity(None, AuditEventType::ApiKeyAuthFailed).await.len(),
		1
	);
}

#[tokio::test]
async fn audit_trail_never_contains_secret_values() {
	let t = TestCore::new().await;
	let (user, _) = t
		.user_with(&[
			PermissionName::CreateUserSecret,
			PermissionName::RevealSecret,
			PermissionName::RotateSecret,
		])
		.await;
	let record = t
		.core
		.vault
		.create(Some(user), NewSecret::new("token", secret("hunter2-value")))
		.await
		.unwrap();
	t.core.vault.reveal(Some(user), &record.id).await.unwrap();
	t.core
		.vault
		.rotate(Some(user), &record.id, secret("hunter3-value"))
		.await
		.unwrap();

	let entries = t
		.core
		.activity
		.query_logs(&Default::default())
		.await
		.unwrap();
	assert!(entries.len() >= 3);
	for entry in entries {
		let details = entry.details.to_string();
		assert!(!details.contains("hunter2-value"), "leaked in {details}");
		assert!(!details.contains("hunter3-value"), "leaked in {details}");
	}
}
