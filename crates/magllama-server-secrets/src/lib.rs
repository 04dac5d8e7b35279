// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secrets management for magllama.
//!
//! Values are encrypted with AES-256-GCM under a single process-wide key
//! before they reach storage ([`encryption`]). The [`SecretsVault`] layers
//! ownership gating, permission checks, lifecycle transitions and audit on
//! top of the store.

pub mod encryption;
pub mod error;
pub mod vault;

pub use encryption::{
	generate_key, generate_key_base64, EncryptedData, SecretCipher, KEY_SIZE, NONCE_SIZE,
};
pub use error::{SecretsError, SecretsResult};
pub use vault::SecretsVault;
