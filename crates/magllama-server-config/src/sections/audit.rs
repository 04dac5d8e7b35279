// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit logging configuration section.

use serde::Deserialize;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
	/// Attempts per sink before a transient failure is given up on.
	pub retry_attempts: u32,
	/// Base delay between attempts; doubled on each retry.
	pub retry_backoff_ms: u64,
	/// Mirror every audit entry to `tracing` in addition to the database.
	pub tracing_sink: bool,
}

impl Default for AuditConfig {
	fn default() -> Self {
		Self {
			retry_attempts: DEFAULT_RETRY_ATTEMPTS,
			retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
			tracing_sink: true,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	#[serde(default)]
	pub retry_attempts: Option<u32>,
	#[serde(default)]
	pub retry_backoff_ms: Option<u64>,
	#[serde(default)]
	pub tracing_sink: Option<bool>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.retry_attempts.is_some() {
			self.retry_attempts = other.retry_attempts;
		}
		if other.retry_backoff_ms.is_some() {
			self.retry_backoff_ms = other.retry_backoff_ms;
		}
		if other.tracing_sink.is_some() {
			self.tracing_sink = other.tracing_sink;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			retry_attempts: self
				.retry_attempts
				.unwrap_or(DEFAULT_RETRY_ATTEMPTS)
				.max(1),
			retry_backoff_ms: self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
			tracing_sink: self.tracing_sink.unwrap_or(true),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = AuditConfigLayer::default().finalize();
		assert_eq!(config, AuditConfig::default());
	}

	#[test]
	fn at_least_one_attempt() {
		let layer = AuditConfigLayer {
			retry_attempts: Some(0),
			..Default::default()
		};
		assert_eq!(layer.finalize().retry_attempts, 1);
	}
}
