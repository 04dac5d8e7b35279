// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles, permissions, and the named capabilities checked by the core.
//!
//! Permissions are rows in the store; the core only ever refers to them by
//! name. [`PermissionName`] enumerates the names the core itself checks, so a
//! typo in a guard is a compile error rather than a silent denial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{PermissionId, RoleId};

/// A named bundle of permissions. Also used as a project-scoped membership label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub name: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// A named capability checked globally per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	pub id: PermissionId,
	pub name: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Permission names checked by the access core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionName {
	CreateApiKey,
	CreateProjectApiKey,
	DeactivateApiKey,
	CreateUserSecret,
	CreateProjectSecret,
	UpdateUserSecret,
	UpdateProjectSecret,
	RevealSecret,
	RotateSecret,
	RevokeSecret,
	CreateProject,
	AssignProjectRole,
	InactivateProject,
	AssignRole,
}

impl PermissionName {
	/// Returns all permission names known to the core.
	pub fn all() -> &'static [PermissionName] {
		&[
			PermissionName::CreateApiKey,
			PermissionName::CreateProjectApiKey,
			PermissionName::DeactivateApiKey,
			PermissionName::CreateUserSecret,
			PermissionName::CreateProjectSecret,
			PermissionName::UpdateUserSecret,
			PermissionName::UpdateProjectSecret,
			PermissionName::RevealSecret,
			PermissionName::RotateSecret,
			PermissionName::RevokeSecret,
			PermissionName::CreateProject,
			PermissionName::AssignProjectRole,
			PermissionName::InactivateProject,
			PermissionName::AssignRole,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionName::CreateApiKey => "create_api_key",
			PermissionName::CreateProjectApiKey => "create_project_api_key",
			PermissionName::DeactivateApiKey => "deactivate_api_key",
			PermissionName::CreateUserSecret => "create_user_secret",
			PermissionName::CreateProjectSecret => "create_project_secret",
			PermissionName::UpdateUserSecret => "update_user_secret",
			PermissionName::UpdateProjectSecret => "update_project_secret",
			PermissionName::RevealSecret => "reveal_secret",
			PermissionName::RotateSecret => "rotate_secret",
			PermissionName::RevokeSecret => "revoke_secret",
			PermissionName::CreateProject => "create_project",
			PermissionName::AssignProjectRole => "assign_project_role",
			PermissionName::InactivateProject => "inactivate_project",
			PermissionName::AssignRole => "assign_role",
		}
	}
}

impl fmt::Display for PermissionName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl AsRef<str> for PermissionName {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
