// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for access control.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs for each entity
//!   ([`UserId`], [`RoleId`], [`ProjectId`], etc.) preventing accidental mixing
//!   of, say, a project id where a user id is expected.
//!
//! All ID types implement transparent serde serialization (as UUID strings),
//! parse from strings, and convert to/from [`uuid::Uuid`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user. Users are owned externally.");
define_id_type!(RoleId, "Unique identifier for a role.");
define_id_type!(PermissionId, "Unique identifier for a permission.");
define_id_type!(ProjectId, "Unique identifier for a project.");
define_id_type!(ApiKeyId, "Unique identifier for an API key.");
define_id_type!(SecretId, "Unique identifier for a stored secret.");
define_id_type!(ActivityLogId, "Unique identifier for an activity log entry.");
