// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret-at-rest encryption configuration.
//!
//! The encryption key is the one piece of configuration without a default:
//! a server that cannot decrypt its secrets must not start.

use base64::{engine::general_purpose::STANDARD, Engine};
use magllama_common_secret::{Secret, SecretString};
use serde::Deserialize;

use crate::error::ConfigError;

/// Length of the AES-256 key in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 32;

pub const ENCRYPTION_KEY_ENV: &str = "MAGLLAMA_SERVER_SECRETS_ENCRYPTION_KEY";

/// Secrets configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct SecretsConfig {
	pub encryption_key: Secret<[u8; ENCRYPTION_KEY_LEN]>,
}

/// Secrets configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsConfigLayer {
	#[serde(default)]
	pub encryption_key: Option<SecretString>,
}

impl SecretsConfigLayer {
	pub fn merge(&mut self, other: SecretsConfigLayer) {
		if other.encryption_key.is_some() {
			self.encryption_key = other.encryption_key;
		}
	}

	pub fn finalize(self) -> Result<SecretsConfig, ConfigError> {
		let encoded = self.encryption_key.ok_or_else(|| {
			ConfigError::MissingRequired(format!(
				"secrets.encryption_key (set {ENCRYPTION_KEY_ENV} or {ENCRYPTION_KEY_ENV}_FILE)"
			))
		})?;

		Ok(SecretsConfig {
			encryption_key: decode_encryption_key(&encoded)?,
		})
	}
}

/// Decode a 32-byte key given as 64 hex characters or standard base64.
pub fn decode_encryption_key(
	encoded: &SecretString,
) -> Result<Secret<[u8; ENCRYPTION_KEY_LEN]>, ConfigError> {
	let raw = encoded.expose().trim();

	let bytes = Secret::new(if raw.len() == ENCRYPTION_KEY_LEN * 2
		&& raw.chars().all(|c| c.is_ascii_hexdigit())
	{
		hex::decode(raw).map_err(|_| invalid_key("not valid hex"))?
	} else {
		STANDARD
			.decode(raw)
			.map_err(|_| invalid_key("not valid hex or base64"))?
	});

	if bytes.expose().len() != ENCRYPTION_KEY_LEN {
		return Err(invalid_key(&format!(
			"expected {ENCRYPTION_KEY_LEN} bytes, got {}",
			bytes.expose().len()
		)));
	}

	let mut key = [0u8; ENCRYPTION_KEY_LEN];
	key.copy_from_slice(bytes.expose());
	Ok(Secret::new(key))
}

fn invalid_key(message: &str) -> ConfigError {
	ConfigError::InvalidValue {
		key: "secrets.encryption_key".to_string(),
		message: message.to_string(),
	}
}
