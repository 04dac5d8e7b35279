// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scrubbing of credential material before an entry reaches any sink.
//!
//! Two rules apply:
//!
//! - object keys that name a credential (`password`, `token`, `value`, ...)
//!   have their value replaced wholesale
//! - any `mgl_` API key token embedded in a string is replaced in place

use std::borrow::Cow;

use magllama_common_secret::REDACTED;
use magllama_server_auth::{API_KEY_PREFIX, API_KEY_RANDOM_BYTES};

use crate::event::AuditLogEntry;

const SENSITIVE_KEYS: &[&str] = &[
	"password",
	"passwd",
	"secret",
	"secret_value",
	"value",
	"plaintext",
	"token",
	"api_key",
	"key",
	"encryption_key",
	"authorization",
	"ciphertext",
	"nonce",
];

fn is_sensitive_key(key: &str) -> bool {
	let lower = key.to_ascii_lowercase();
	SENSITIVE_KEYS.contains(&lower.as_str())
}

/// Replace every API key token inside `input`.
pub fn redact_string(input: &str) -> Cow<'_, str> {
	if !input.contains(API_KEY_PREFIX) {
		return Cow::Borrowed(input);
	}

	let mut out = String::with_capacity(input.len());
	let mut rest = input;
	while let Some(pos) = rest.find(API_KEY_PREFIX) {
		out.push_str(&rest[..pos]);
		let after = &rest[pos + API_KEY_PREFIX.len()..];
		let hex_len = after
			.char_indices()
			.take_while(|(_, c)| c.is_ascii_hexdigit())
			.count();
		if hex_len >= API_KEY_RANDOM_BYTES {
			out.push_str(REDACTED);
			rest = &after[hex_len..];
		} else {
			out.push_str(API_KEY_PREFIX);
			rest = after;
		}
	}
	out.push_str(rest);
	Cow::Owned(out)
}

pub fn redact_optional_string(value: &mut Option<String>) {
	if let Some(s) = value {
		redact_in_place(s);
	}
}

fn redact_in_place(s: &mut String) {
	let redacted = match redact_string(s) {
		Cow::Owned(redacted) => redacted,
		Cow::Borrowed(_) => return,
	};
	*s = redacted;
}

pub fn redact_json_value(value: &mut serde_json::Value) {
	match value {
		serde_json::Value::Object(map) => {
			for (key, v) in map.iter_mut() {
				if is_sensitive_key(key) && !v.is_null() {
					*v = serde_json::Value::String(REDACTED.to_string());
				} else {
					redact_json_value(v);
				}
			}
		}
		serde_json::Value::Array(items) => {
			for item in items {
				redact_json_value(item);
			}
		}
		serde_json::Value::String(s) => redact_in_place(s),
		_ => {}
	}
}

/// Redact all free-form fields of an entry.
pub fn redact_entry(entry: &mut AuditLogEntry) {
	redact_json_value(&mut entry.details);
	redact_optional_string(&mut entry.resource_id);
}
