// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use magllama_server_audit::AuditError;
use magllama_server_auth::ErrorKind;
use magllama_server_authz::AuthzError;
use magllama_server_db::DbError;
use thiserror::Error;

pub type SecretsResult<T> = Result<T, SecretsError>;

/// Vault and cipher failures. No variant carries plaintext, key material or
/// ciphertext.
#[derive(Debug, Error)]
pub enum SecretsError {
	#[error("encryption failed: {0}")]
	Encryption(String),

	/// Authentication tag mismatch, wrong key, bad nonce or undecodable
	/// plaintext.
	#[error("decryption failed")]
	DecryptionFailed,

	#[error("invalid key size: expected {expected}, got {actual}")]
	InvalidKeySize { expected: usize, actual: usize },

	#[error("secret not found: {0}")]
	NotFound(String),

	/// The secret is revoked or expired for the requested transition.
	#[error("conflict: {0}")]
	Conflict(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Authz(#[from] AuthzError),

	#[error(transparent)]
	Db(#[from] DbError),

	#[error("audit write failed: {0}")]
	Audit(#[from] AuditError),
}

impl SecretsError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			SecretsError::Encryption(_) | SecretsError::InvalidKeySize { .. } => ErrorKind::Internal,
			SecretsError::DecryptionFailed => ErrorKind::DecryptionFailed,
			SecretsError::NotFound(_) => ErrorKind::NotFound,
			SecretsError::Conflict(_) => ErrorKind::Conflict,
			SecretsError::InvalidInput(_) => ErrorKind::InvalidInput,
			SecretsError::Authz(e) => e.kind(),
			SecretsError::Db(e) => e.kind(),
			SecretsError::Audit(e) => e.kind(),
		}
	}
}
