// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper types for sensitive values.
//!
//! [`Secret<T>`] holds a value that must never show up in logs, traces, or
//! serialized output: plaintext API keys, revealed secret values, passwords,
//! and the at-rest encryption key. `Debug`, `Display` and `Serialize` all
//! render [`REDACTED`]; the only way to read the value is [`Secret::expose`].
//! The inner value is zeroized on drop.

use std::fmt;

use zeroize::Zeroize;

/// Placeholder rendered in place of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that is redacted from all formatting and zeroized on drop.
pub struct Secret<T: Zeroize> {
	inner: T,
}

/// The common case: a secret string.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the wrapped value.
	///
	/// Every call site is a place where the secret leaves its wrapper, so keep
	/// them few and obvious.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T: Zeroize> Drop for Secret<T> {
	fn drop(&mut self) {
		self.inner.zeroize();
	}
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize> From<T> for Secret<T> {
	fn from(inner: T) -> Self {
		Self::new(inner)
	}
}

impl SecretString {
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

#[cfg(feature = "serde")]
impl<T: Zeroize> serde::Serialize for Secret<T> {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

#[cfg(feature = "serde")]
impl<'de, T: Zeroize + serde::Deserialize<'de>> serde::Deserialize<'de> for Secret<T> {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		T::deserialize(deserializer).map(Secret::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_is_redacted() {
		let secret = SecretString::new("hunter2".to_string());
		assert_eq!(format!("{secret:?}"), REDACTED);
	}

	#[test]
	fn display_is_redacted() {
		let secret = SecretString::new("hunter2".to_string());
		assert_eq!(format!("{secret}"), REDACTED);
	}

	#[test]
	fn expose_returns_inner_value() {
		let secret = SecretString::new("hunter2".to_string());
		assert_eq!(secret.expose(), "hunter2");
	}

	#[test]
	fn serialize_is_redacted() {
		let secret = SecretString::new("hunter2".to_string());
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, format!("\"{REDACTED}\""));
	}

	#[test]
	fn deserialize_wraps_value() {
		let secret: SecretString = serde_json::from_str("\"hunter2\"").unwrap();
		assert_eq!(secret.expose(), "hunter2");
	}

	#[test]
	fn debug_inside_struct_is_redacted() {
		#[derive(Debug)]
		#[allow(dead_code)]
		struct Config {
			token: SecretString,
		}

		let config = Config {
			token: SecretString::new("tok_live_123".to_string()),
		};
		let rendered = format!("{config:?}");
		assert!(!rendered.contains("tok_live_123"));
		assert!(rendered.contains(REDACTED));
	}

	proptest! {
		#[test]
		fn formatting_never_leaks(value in "[a-zA-Z0-9]{12,64}") {
			let secret = SecretString::new(value.clone());
			let debug_out = format!("{secret:?}");
			let display_out = format!("{secret}");
			prop_assert!(!debug_out.contains(&value));
			prop_assert!(!display_out.contains(&value));
		}
	}
}
