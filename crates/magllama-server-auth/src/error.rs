// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Failure taxonomy shared by every access-control component.
//!
//! Each crate keeps its own `thiserror` enum; they all classify into
//! [`ErrorKind`] so the transport layer can map failures to status codes
//! without matching on crate-specific variants.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// A global permission check failed.
	PermissionDenied,
	/// A project or ownership scope check failed.
	AccessDenied,
	/// The referenced role, permission, project, secret or key does not exist.
	NotFound,
	/// Bad credentials, API key or login.
	Unauthorized,
	/// Ciphertext could not be authenticated or decrypted.
	DecryptionFailed,
	/// A state transition was attempted on a terminal record.
	Conflict,
	/// Caller-supplied input failed validation.
	InvalidInput,
	/// Storage, audit or other server-side failure.
	Internal,
}

impl ErrorKind {
	/// True for the failures that must be written to the audit trail before
	/// being surfaced.
	pub fn is_access_failure(&self) -> bool {
		matches!(
			self,
			ErrorKind::PermissionDenied | ErrorKind::AccessDenied | ErrorKind::Unauthorized
		)
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::PermissionDenied => "permission_denied",
			ErrorKind::AccessDenied => "access_denied",
			ErrorKind::NotFound => "not_found",
			ErrorKind::Unauthorized => "unauthorized",
			ErrorKind::DecryptionFailed => "decryption_failed",
			ErrorKind::Conflict => "conflict",
			ErrorKind::InvalidInput => "invalid_input",
			ErrorKind::Internal => "internal",
		};
		write!(f, "{s}")
	}
}

/// Failures from password hashing.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
	#[error("password hashing failed")]
	Hash,

	#[error("stored password hash is malformed")]
	MalformedHash,
}

impl PasswordError {
	pub fn kind(&self) -> ErrorKind {
		ErrorKind::Internal
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn access_failures() {
		assert!(ErrorKind::PermissionDenied.is_access_failure());
		assert!(ErrorKind::AccessDenied.is_access_failure());
		assert!(ErrorKind::Unauthorized.is_access_failure());
		assert!(!ErrorKind::NotFound.is_access_failure());
		assert!(!ErrorKind::DecryptionFailed.is_access_failure());
	}

	#[test]
	fn display_is_snake_case() {
		assert_eq!(ErrorKind::DecryptionFailed.to_string(), "decryption_failed");
	}
}
