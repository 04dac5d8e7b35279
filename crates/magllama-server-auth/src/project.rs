// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Projects and project membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ProjectId, RoleId, UserId};

/// A project. Soft-deleted via `inactive_at`; never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
	pub id: ProjectId,
	pub name: String,
	pub parent_id: Option<ProjectId>,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub inactive_at: Option<DateTime<Utc>>,
	pub inactivated_by: Option<UserId>,
}

impl Project {
	pub fn is_active(&self) -> bool {
		self.inactive_at.is_none()
	}
}

/// Input for creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
	pub name: String,
	pub parent_id: Option<ProjectId>,
	pub description: Option<String>,
}

/// Grants a user a role within a specific project.
///
/// Independent of global [`crate::rbac::Role`] assignment: a user can be a
/// global "viewer" and a project "admin" at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectMember {
	pub project_id: ProjectId,
	pub user_id: UserId,
	pub role_id: RoleId,
}
