// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret records and lifecycle state.
//!
//! [`SecretRecord`] is the metadata view of a stored secret. It has no field
//! for the value: the ciphertext only leaves the store through the vault's
//! reveal path, and the plaintext only as a [`SecretString`].
//!
//! Lifecycle:
//!
//! ```text
//! active --rotate--> active
//! active --revoke--> revoked   (terminal)
//! active --time----> expired   (reveal refused; no sweeper)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use magllama_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ProjectId, SecretId, UserId};

/// Default `secret_type` when the caller does not provide one.
pub const DEFAULT_SECRET_TYPE: &str = "generic";

/// Owner of a secret: a user (personal) or a project (shared), never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SecretOwner {
	User(UserId),
	Project(ProjectId),
}

impl SecretOwner {
	pub fn user_id(&self) -> Option<UserId> {
		match self {
			SecretOwner::User(id) => Some(*id),
			SecretOwner::Project(_) => None,
		}
	}

	pub fn project_id(&self) -> Option<ProjectId> {
		match self {
			SecretOwner::User(_) => None,
			SecretOwner::Project(id) => Some(*id),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretStatus {
	Active,
	Revoked,
	Expired,
}

impl fmt::Display for SecretStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SecretStatus::Active => write!(f, "active"),
			SecretStatus::Revoked => write!(f, "revoked"),
			SecretStatus::Expired => write!(f, "expired"),
		}
	}
}

/// Metadata of a stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
	pub id: SecretId,
	pub name: String,
	pub owner: SecretOwner,
	pub created_by: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub updated_by: UserId,
	pub rotated_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
	pub revoked_by: Option<UserId>,
	pub expires_at: Option<DateTime<Utc>>,
	pub description: Option<String>,
	pub secret_type: String,
	pub metadata: BTreeMap<String, String>,
}

impl SecretRecord {
	/// Revocation wins over expiry: a revoked secret reports `Revoked` even
	/// after its expiry time.
	pub fn status_at(&self, now: DateTime<Utc>) -> SecretStatus {
		if self.revoked_at.is_some() {
			SecretStatus::Revoked
		} else if self.expires_at.is_some_and(|exp| exp <= now) {
			SecretStatus::Expired
		} else {
			SecretStatus::Active
		}
	}

	pub fn status(&self) -> SecretStatus {
		self.status_at(Utc::now())
	}
}

/// Input for creating a secret.
#[derive(Debug)]
pub struct NewSecret {
	pub name: String,
	pub value: SecretString,
	/// When set the secret is shared with the project; otherwise it belongs
	/// to the creating user.
	pub project_id: Option<ProjectId>,
	pub description: Option<String>,
	pub secret_type: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub metadata: BTreeMap<String, String>,
}

impl NewSecret {
	pub fn new(name: impl Into<String>, value: SecretString) -> Self {
		Self {
			name: name.into(),
			value,
			project_id: None,
			description: None,
			secret_type: None,
			expires_at: None,
			metadata: BTreeMap::new(),
		}
	}

	pub fn for_project(mut self, project_id: ProjectId) -> Self {
		self.project_id = Some(project_id);
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn secret_type(mut self, secret_type: impl Into<String>) -> Self {
		self.secret_type = Some(secret_type.into());
		self
	}

	pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
		self.expires_at = Some(expires_at);
		self
	}

	pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}
}

/// Partial update of a secret. `None` fields are left unchanged.
#[derive(Debug, Default)]
pub struct SecretUpdate {
	pub name: Option<String>,
	pub value: Option<SecretString>,
	pub description: Option<String>,
	pub secret_type: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub metadata: Option<BTreeMap<String, String>>,
}

impl SecretUpdate {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.value.is_none()
			&& self.description.is_none()
			&& self.secret_type.is_none()
			&& self.expires_at.is_none()
			&& self.metadata.is_none()
	}
}
