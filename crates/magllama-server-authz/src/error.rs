// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use magllama_server_audit::AuditError;
use magllama_server_auth::{ErrorKind, PasswordError};
use magllama_server_db::DbError;
use thiserror::Error;

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Failures of the access evaluators and the services built on them.
///
/// Messages name the permission or resource class but never carry token,
/// password, or secret material.
#[derive(Debug, Error)]
pub enum AuthzError {
	/// The caller lacks a global permission.
	#[error("permission denied: missing '{permission}'")]
	PermissionDenied { permission: String },

	/// The caller is outside the project or ownership scope.
	#[error("access denied to {resource}")]
	AccessDenied { resource: String },

	/// Bad API key or login. Never says which part was wrong.
	#[error("unauthorized")]
	Unauthorized,

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Db(#[from] DbError),

	/// A denial or authentication failure could not be recorded.
	#[error("audit write failed: {0}")]
	Audit(#[from] AuditError),

	#[error(transparent)]
	Password(#[from] PasswordError),
}

impl AuthzError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			AuthzError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
			AuthzError::AccessDenied { .. } => ErrorKind::AccessDenied,
			AuthzError::Unauthorized => ErrorKind::Unauthorized,
			AuthzError::NotFound(_) => ErrorKind::NotFound,
			AuthzError::Conflict(_) => ErrorKind::Conflict,
			AuthzError::InvalidInput(_) => ErrorKind::InvalidInput,
			AuthzError::Db(e) => e.kind(),
			AuthzError::Audit(e) => e.kind(),
			AuthzError::Password(e) => e.kind(),
		}
	}
}
