// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use magllama_server_audit::AuditEventType;
use magllama_server_auth::{ApiKeyScope, ErrorKind, PermissionName};
use magllama_server_authz::extract_bearer_token;

use super::support::TestCore;

#[tokio::test]
async fn user_key_lifecycle() {
	let t = TestCore::new().await;
	let (holder, _) = t
		.user_with(&[PermissionName::CreateApiKey, PermissionName::DeactivateApiKey])
		.await;

	let issued = t
		.core
		.api_keys
		.issue_user_key(Some(holder), Some("laptop"))
		.await
		.unwrap();
	assert_eq!(issued.cache_control, "no-store");
	assert_ne!(issued.key.key_hash, *issued.token.expose());

	let header = format!("Bearer {}", issued.token.expose());
	let token = extract_bearer_token(&header).unwrap();
	let key = t.core.api_keys.authenticate(token).await.unwrap();
	assert_eq!(key.scope(), Some(ApiKeyScope::User { user_id: holder }));
	assert!(key.last_used_at.is_some());

	assert!(t
		.core
		.api_keys
		.revoke(Some(holder), &issued.key.id)
		.await
		.unwrap());
	assert!(!t
		.core
		.api_keys
		.revoke(Some(holder), &issued.key.id)
		.await
		.unwrap());

	let err = t.core.api_keys.authenticate(token).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Unauthorized);

	let keys = t.core.api_keys.list_user_keys(Some(holder)).await.unwrap();
	assert_eq!(keys.len(), 1);
	assert!(!keys[0].is_active());

	assert_eq!(
		t.activity(Some(holder), AuditEventType::ApiKeyCreated).await.len(),
		1
	);
	assert_eq!(
		t.activity(Some(holder), AuditEventType::ApiKeyRevoked).await.len(),
		1
	);
}

#[tokio::test]
async fn project_key_requires_membership() {
	let t = TestCore::new().await;
	let project = t.project("billing").await;
	let (outsider, _) = t.user_with(&[PermissionName::CreateProjectApiKey]).await;

	let err = t
		.core
		.api_keys
		.issue_project_key(Some(outsider), &project, None)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::AccessDenied);
	assert_eq!(
		t.activity(Some(outsider), AuditEventType::ProjectAccessDenied)
			.await
			.len(),
		1
	);

	let err = t
		.core
		.api_keys
		.list_project_keys(Some(outsider), &project)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::AccessDenied);
}
