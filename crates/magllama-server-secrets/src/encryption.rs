// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM encryption of secret values at rest.
//!
//! One process-wide key, loaded from configuration at startup and carried in
//! a [`SecretCipher`]. Every encryption draws a fresh 96-bit nonce which is
//! stored next to the ciphertext. Stored secret values are bound to their
//! secret id as associated data, so a value copied onto another row fails to
//! decrypt.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng, Payload},
	Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use magllama_common_secret::{Secret, SecretString, REDACTED};
use magllama_server_auth::SecretId;
use magllama_server_db::StoredCiphertext;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{SecretsError, SecretsResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Encrypted data with nonce.
#[derive(Debug, Clone)]
pub struct EncryptedData {
	pub ciphertext: Vec<u8>,
	pub nonce: [u8; NONCE_SIZE],
}

impl From<EncryptedData> for StoredCiphertext {
	fn from(data: EncryptedData) -> Self {
		StoredCiphertext {
			ciphertext: data.ciphertext,
			nonce: data.nonce.to_vec(),
		}
	}
}

impl TryFrom<&StoredCiphertext> for EncryptedData {
	type Error = SecretsError;

	fn try_from(stored: &StoredCiphertext) -> Result<Self, Self::Error> {
		let nonce: [u8; NONCE_SIZE] = stored
			.nonce
			.as_slice()
			.try_into()
			.map_err(|_| SecretsError::DecryptionFailed)?;
		Ok(EncryptedData {
			ciphertext: stored.ciphertext.clone(),
			nonce,
		})
	}
}

/// Generate a random encryption key.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}

/// A fresh key rendered as standard base64, the form accepted by
/// `MAGLLAMA_SERVER_SECRETS_ENCRYPTION_KEY`.
pub fn generate_key_base64() -> SecretString {
	let key = generate_key();
	SecretString::new(STANDARD.encode(key.as_slice()))
}

/// Generate a random nonce.
///
/// Random 96-bit nonces are safe well past any realistic number of secret
/// writes under one key; a (key, nonce) pair must never repeat.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

/// Holder of the process-wide key. Built once and shared by `Arc`.
pub struct SecretCipher {
	key: Zeroizing<[u8; KEY_SIZE]>,
}

impl std::fmt::Debug for SecretCipher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecretCipher")
			.field("key", &REDACTED)
			.finish()
	}
}

impl SecretCipher {
	pub fn new(key: &Secret<[u8; KEY_SIZE]>) -> Self {
		Self {
			key: Zeroizing::new(*key.expose()),
		}
	}

	/// Build from raw bytes, rejecting anything but exactly [`KEY_SIZE`].
	pub fn from_slice(key: &[u8]) -> SecretsResult<Self> {
		let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| SecretsError::InvalidKeySize {
			expected: KEY_SIZE,
			actual: key.len(),
		})?;
		Ok(Self {
			key: Zeroizing::new(key),
		})
	}

	/// A cipher under a freshly generated key.
	pub fn generate() -> Self {
		Self { key: generate_key() }
	}

	fn aead(&self) -> Aes256Gcm {
		Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_slice()))
	}

	pub fn encrypt(&self, plaintext: &[u8]) -> SecretsResult<EncryptedData> {
		self.encrypt_with_aad(plaintext, &[])
	}

	pub fn decrypt(&self, encrypted: &EncryptedData) -> SecretsResult<Zeroizing<Vec<u8>>> {
		self.decrypt_with_aad(encrypted, &[])
	}

	/// Encrypt `plaintext`, authenticating `aad` alongside it. The same `aad`
	/// must be supplied to decrypt.
	pub fn encrypt_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> SecretsResult<EncryptedData> {
		let nonce_bytes = generate_nonce();
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = self
			.aead()
			.encrypt(nonce, Payload { msg: plaintext, aad })
			.map_err(|e| SecretsError::Encryption(format!("secret encryption failed: {e}")))?;

		Ok(EncryptedData {
			ciphertext,
			nonce: nonce_bytes,
		})
	}

	pub fn decrypt_with_aad(
		&self,
		encrypted: &EncryptedData,
		aad: &[u8],
	) -> SecretsResult<Zeroizing<Vec<u8>>> {
		let nonce = Nonce::from_slice(&encrypted.nonce);

		let plaintext = self
			.aead()
			.decrypt(
				nonce,
				Payload {
					msg: encrypted.ciphertext.as_slice(),
					aad,
				},
			)
			.map_err(|_| SecretsError::DecryptionFailed)?;

		Ok(Zeroizing::new(plaintext))
	}

	/// Encrypt the value of secret `id` into its stored form.
	pub fn seal(&self, id: &SecretId, value: &SecretString) -> SecretsResult<StoredCiphertext> {
		let aad = secret_aad(id);
		Ok(self
			.encrypt_with_aad(value.expose().as_bytes(), aad.as_bytes())?
			.into())
	}

	/// Decrypt the stored value of secret `id`. Non-UTF-8 plaintext is
	/// treated as corruption.
	pub fn open(&self, id: &SecretId, stored: &StoredCiphertext) -> SecretsResult<SecretString> {
		let encrypted = EncryptedData::try_from(stored)?;
		let aad = secret_aad(id);
		let mut plaintext = self.decrypt_with_aad(&encrypted, aad.as_bytes())?;
		let bytes = std::mem::take(&mut *plaintext);
		String::from_utf8(bytes)
			.map(SecretString::new)
			.map_err(|e| {
				let _ = Zeroizing::new(e.into_bytes());
				SecretsError::DecryptionFailed
			})
	}
}

fn secret_aad(id: &SecretId) -> String {
	format!("magllama-secret:{id}")
}
