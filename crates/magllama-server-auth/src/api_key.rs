// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key records, token generation and digesting.
//!
//! An API key token is `mgl_` followed by 64 hex characters (256 random bits).
//! Only the SHA-256 digest of the full token is stored. Because the token
//! already carries full entropy, a fast deterministic digest is sufficient and
//! lets authentication be a single indexed lookup on `key_hash`.

use chrono::{DateTime, Utc};
use magllama_common_secret::SecretString;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::types::{ApiKeyId, ProjectId, UserId};

/// Prefix identifying magllama API keys in logs, scanners, and headers.
pub const API_KEY_PREFIX: &str = "mgl_";

/// Number of random bytes in a token.
pub const API_KEY_RANDOM_BYTES: usize = 32;

/// Value for the `Cache-Control` header on responses carrying a fresh key.
pub const ISSUED_KEY_CACHE_CONTROL: &str = "no-store";

/// A stored API key. Never contains the plaintext token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
	pub id: ApiKeyId,
	/// Issuing user. Set for both user keys and project keys.
	pub user_id: Option<UserId>,
	/// Owning project. Set only for project keys.
	pub project_id: Option<ProjectId>,
	#[serde(skip_serializing)]
	pub key_hash: String,
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
	pub inactive_at: Option<DateTime<Utc>>,
	pub inactivated_by: Option<UserId>,
}

/// Whom an API key acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiKeyScope {
	User { user_id: UserId },
	Project { project_id: ProjectId, issued_by: Option<UserId> },
}

impl ApiKey {
	pub fn is_active(&self) -> bool {
		self.inactive_at.is_none()
	}

	/// The scope owner. Project keys are scoped to the project even though
	/// they also record the issuing user.
	pub fn scope(&self) -> Option<ApiKeyScope> {
		match (self.project_id, self.user_id) {
			(Some(project_id), issued_by) => Some(ApiKeyScope::Project {
				project_id,
				issued_by,
			}),
			(None, Some(user_id)) => Some(ApiKeyScope::User { user_id }),
			(None, None) => None,
		}
	}
}

/// Generate a new random API key token.
pub fn generate_api_key_token() -> SecretString {
	let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
	OsRng.fill_bytes(&mut bytes);
	let token = format!("{API_KEY_PREFIX}{}", hex::encode(bytes));
	bytes.zeroize();
	SecretString::new(token)
}

/// SHA-256 digest of a token, hex-encoded. This is the lookup key.
pub fn hash_api_key(token: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(token.as_bytes());
	hex::encode(hasher.finalize())
}

/// Cheap shape check before touching the store.
pub fn is_well_formed_token(token: &str) -> bool {
	token
		.strip_prefix(API_KEY_PREFIX)
		.map(|rest| {
			rest.len() == API_KEY_RANDOM_BYTES * 2 && rest.chars().all(|c| c.is_ascii_hexdigit())
		})
		.unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn sample_key(user_id: Option<UserId>, project_id: Option<ProjectId>) -> ApiKey {
		ApiKey {
			id: ApiKeyId::generate(),
			user_id,
			project_id,
			key_hash: "abc".to_string(),
			description: None,
			created_at: Utc::now(),
			last_used_at: None,
			inactive_at: None,
			inactivated_by: None,
		}
	}

	#[test]
	fn token_has_prefix_and_length() {
		let token = generate_api_key_token();
		assert!(token.expose().starts_with(API_KEY_PREFIX));
		assert_eq!(
			token.expose().len(),
			API_KEY_PREFIX.len() + API_KEY_RANDOM_BYTES * 2
		);
		assert!(is_well_formed_token(token.expose()));
	}

	#[test]
	fn tokens_are_unique() {
		let a = generate_api_key_token();
		let b = generate_api_key_token();
		assert_ne!(a.expose(), b.expose());
	}

	#[test]
	fn hash_is_sha256_hex() {
		let hash = hash_api_key("mgl_test");
		assert_eq!(hash.len(), 64);
		assert_ne!(hash, "mgl_test");
	}

	#[test]
	fn malformed_tokens_are_rejected() {
		assert!(!is_well_formed_token(""));
		assert!(!is_well_formed_token("mgl_short"));
		assert!(!is_well_formed_token(&format!("xyz_{}", "a".repeat(64))));
		assert!(!is_well_formed_token(&format!("mgl_{}", "g".repeat(64))));
	}

	#[test]
	fn scope_prefers_project() {
		let user = UserId::generate();
		let project = ProjectId::generate();

		assert_eq!(
			sample_key(Some(user), None).scope(),
			Some(ApiKeyScope::User { user_id: user })
		);
		assert_eq!(
			sample_key(Some(user), Some(project)).scope(),
			Some(ApiKeyScope::Project {
				project_id: project,
				issued_by: Some(user)
			})
		);
		assert_eq!(sample_key(None, None).scope(), None);
	}

	#[test]
	fn serialized_key_omits_hash() {
		let json = serde_json::to_value(sample_key(Some(UserId::generate()), None)).unwrap();
		assert!(json.get("key_hash").is_none());
	}

	proptest! {
		#[test]
		fn token_hash_is_deterministic(input in ".*") {
			prop_assert_eq!(hash_api_key(&input), hash_api_key(&input));
		}

		#[test]
		fn single_bit_flip_changes_hash(byte_idx in 0usize..64, bit in 0u8..8) {
			let token = generate_api_key_token();
			let mut bytes = token.expose().clone().into_bytes();
			let idx = API_KEY_PREFIX.len() + byte_idx;
			bytes[idx] ^= 1 << bit;
			let flipped = String::from_utf8_lossy(&bytes).into_owned();
			prop_assert_ne!(hash_api_key(token.expose()), hash_api_key(&flipped));
		}
	}
}
