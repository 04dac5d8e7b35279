// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity types, credential hashing and access-control records.
//!
//! This crate has no storage dependency. It defines the typed records the
//! persistence layer reads and writes, the [`ErrorKind`] taxonomy, and the
//! two one-way hashes used for credentials:
//!
//! - [`password`]: slow salted Argon2id for interactive passwords
//! - [`api_key`]: fast SHA-256 digest for full-entropy API key tokens

mod argon2_config;

pub mod api_key;
pub mod error;
pub mod identity;
pub mod password;
pub mod project;
pub mod rbac;
pub mod secret;
pub mod types;

pub use api_key::{
	generate_api_key_token, hash_api_key, is_well_formed_token, ApiKey, ApiKeyScope,
	API_KEY_PREFIX, API_KEY_RANDOM_BYTES, ISSUED_KEY_CACHE_CONTROL,
};
pub use error::{ErrorKind, PasswordError};
pub use identity::{
	Credentials, IdentityError, IdentityProvider, IdentityProviderKind, UnsupportedProvider,
};
pub use password::{hash_password, verify_password, verify_password_or_dummy};
pub use project::{NewProject, Project, ProjectMember};
pub use rbac::{Permission, PermissionName, Role};
pub use secret::{
	NewSecret, SecretOwner, SecretRecord, SecretStatus, SecretUpdate, DEFAULT_SECRET_TYPE,
};
pub use types::{ActivityLogId, ApiKeyId, PermissionId, ProjectId, RoleId, SecretId, UserId};
