// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing for interactive login.
//!
//! Passwords are hashed with Argon2id and a per-hash random salt, stored in
//! PHC string format. Verification goes through the `password-hash` verifier,
//! which compares digests in constant time.
//!
//! [`verify_password_or_dummy`] must be used on login paths: when the username
//! does not exist it still runs a full Argon2 verification against a dummy
//! hash, so response timing does not reveal which usernames exist.

use argon2::password_hash::{
	rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use magllama_common_secret::SecretString;

use crate::argon2_config::argon2_instance;
use crate::error::PasswordError;

/// Hash a password for storage.
pub fn hash_password(password: &SecretString) -> Result<String, PasswordError> {
	hash_bytes(password.expose().as_bytes())
}

fn hash_bytes(password: &[u8]) -> Result<String, PasswordError> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password, &salt)
		.map(|hash| hash.to_string())
		.map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &SecretString, stored_hash: &str) -> Result<bool, PasswordError> {
	let parsed = PasswordHash::new(stored_hash).map_err(|_| PasswordError::MalformedHash)?;
	Ok(
		argon2_instance()
			.verify_password(password.expose().as_bytes(), &parsed)
			.is_ok(),
	)
}

/// Fixed Argon2id hash at the production cost (`m=19456,t=2,p=1`) that no
/// password matches. Being a constant, the first unknown-user login costs
/// the same as every later one.
const DUMMY_HASH: &str =
	"$argon2id$v=19$m=19456,t=2,p=1$/q821xih9V8Uz0LvV4XfrA$pQMyX+4kbKsKfjfT68ROJcL/pXDrIM7OLtDwSO/CxA4";

/// Verify a password, running the comparison even when no user matched.
///
/// `stored_hash` is `None` when the username was not found; the password is
/// then checked against a fixed dummy hash and the result is always `false`.
/// A malformed stored hash is treated as a failed verification.
pub fn verify_password_or_dummy(password: &SecretString, stored_hash: Option<&str>) -> bool {
	match stored_hash {
		Some(hash) => verify_password(password, hash).unwrap_or_else(|e| {
			tracing::warn!(error = %e, "stored password hash could not be parsed");
			false
		}),
		None => {
			let _ = verify_password(password, DUMMY_HASH);
			false
		}
	}
}
