// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decisions for the magllama core.
//!
//! Two evaluators answer every authorization question:
//!
//! - [`PermissionEvaluator`]: does a user hold a global permission through
//!   some assigned role?
//! - [`ProjectAccessEvaluator`]: is a user a member of an active project,
//!   optionally under a named role?
//!
//! Callers that need both check the permission first and the scope second.
//! Denials are written to the activity log before the error is returned.
//! The services in this crate ([`ApiKeyManager`], [`ProjectService`],
//! [`RbacAdmin`], [`PasswordIdentityProvider`]) are built on the evaluators.

pub mod api_keys;
pub mod error;
pub mod login;
pub mod permission;
pub mod project_access;
pub mod projects;
pub mod rbac_admin;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api_keys::{extract_bearer_token, ApiKeyManager, IssuedApiKey};
pub use error::{AuthzError, AuthzResult};
pub use login::PasswordIdentityProvider;
pub use permission::PermissionEvaluator;
pub use project_access::ProjectAccessEvaluator;
pub use projects::ProjectService;
pub use rbac_admin::RbacAdmin;
