// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the magllama access core.
//!
//! One repository per entity group, each behind an `async_trait` store trait
//! so services can be exercised against alternative stores. Rows are parsed
//! into the typed records of `magllama-server-auth` by dedicated
//! `parse_*_row` functions.

pub mod activity;
pub mod api_key;
pub mod credentials;
pub mod error;
pub mod pool;
pub mod project;
pub mod rbac;
mod row;
pub mod secret;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use activity::{ActivityLogQuery, ActivityLogRepository, ActivityLogStore};
pub use api_key::{ApiKeyRepository, ApiKeyStore, LastUsed, NewApiKey};
pub use credentials::{CredentialRepository, CredentialStore, UserCredentials};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use project::{ProjectRepository, ProjectStore};
pub use rbac::{RbacRepository, RbacStore};
pub use secret::{SecretChanges, SecretRepository, SecretStore, StoredCiphertext, Transition};

pub use sqlx::SqlitePool;
