// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Properties that must hold whatever the grant set looks like.

use magllama_common_secret::SecretString;
use magllama_server_audit::AuditEventType;
use magllama_server_auth::{ErrorKind, NewSecret, PermissionName, SecretStatus, UserId};
use proptest::prelude::*;
use proptest::sample::subsequence;

use super::support::TestCore;

fn runtime() -> tokio::runtime::Runtime {
	tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.unwrap()
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(16))]

	/// A user holds exactly the permissions reachable through their roles.
	#[test]
	fn permissions_follow_role_edges(
		granted in subsequence(PermissionName::all().to_vec(), 0..=PermissionName::all().len()),
	) {
		runtime().block_on(async {
			let t = TestCore::new().await;
			let (user, role) = t.user_with(&granted).await;

			for name in PermissionName::all() {
				let held = t.core.permissions.has_permission(&user, name).await.unwrap();
				assert_eq!(held, granted.contains(name), "{name:?}");
			}

			for name in &granted {
				let permission = t
					.core
					.rbac_store
					.get_permission_by_name(name.as_str())
					.await
					.unwrap()
					.unwrap();
				assert!(t
					.core
					.rbac_store
					.revoke_permission(&role, &permission.id)
					.await
					.unwrap());
				assert!(!t.core.permissions.has_permission(&user, name).await.unwrap());
			}
		});
	}

	/// Global permissions never stand in for project membership.
	#[test]
	fn global_permissions_never_grant_project_access(
		granted in subsequence(PermissionName::all().to_vec(), 0..=PermissionName::all().len()),
	) {
		runtime().block_on(async {
			let t = TestCore::new().await;
			let project = t.project("isolated").await;
			let (user, _) = t.user_with(&granted).await;

			assert!(!t
				.core
				.project_access
				.has_project_access(&user, &project, None)
				.await
				.unwrap());
		});
	}
}

#[tokio::test]
async fn revoked_secret_is_terminal() {
	let t = TestCore::new().await;
	let (user, _) = t
		.user_with(&[
			PermissionName::CreateUserSecret,
			PermissionName::RevealSecret,
			PermissionName::RotateSecret,
			PermissionName::RevokeSecret,
		])
		.await;
	let record = t
		.core
		.vault
		.create(
			Some(user),
			NewSecret::new("signing", SecretString::new("v1".to_string())),
		)
		.await
		.unwrap();

	let revoked = t.core.vault.revoke(Some(user), &record.id).await.unwrap();
	assert_eq!(revoked.status(), SecretStatus::Revoked);
	assert_eq!(revoked.revoked_by, Some(user));

	let err = t.core.vault.reveal(Some(user), &record.id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Conflict);
	let err = t
		.core
		.vault
		.rotate(Some(user), &record.id, SecretString::new("v2".to_string()))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Conflict);
	let err = t.core.vault.revoke(Some(user), &record.id).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Conflict);

	let record = t.core.vault.get(Some(user), &record.id).await.unwrap();
	assert_eq!(record.rotated_at, None);
}

#[tokio::test]
async fn role_assignment_is_idempotent_and_audited_once() {
	let t = TestCore::new().await;
	let (admin, _) = t.user_with(&[PermissionName::AssignRole]).await;
	let (_, role) = t.user_with(&[PermissionName::CreateProject]).await;
	let target = UserId::generate();

	assert!(t.core.rbac.assign_role(Some(admin), &target, &role).await.unwrap());
	assert!(!t.core.rbac.assign_role(Some(admin), &target, &role).await.unwrap());
	assert!(t
		.core
		.permissions
		.has_permission(&target, PermissionName::CreateProject)
		.await
		.unwrap());
	assert_eq!(
		t.activity(Some(admin), AuditEventType::RoleAssigned).await.len(),
		1
	);

	assert!(t.core.rbac.unassign_role(Some(admin), &target, &role).await.unwrap());
	assert!(!t.core.rbac.unassign_role(Some(admin), &target, &role).await.unwrap());
	assert!(!t
		.core
		.permissions
		.has_permission(&target, PermissionName::CreateProject)
		.await
		.unwrap());
}
