// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment.
//!
//! A secret named `FOO` can be supplied either inline as `FOO=value` or as a
//! path in `FOO_FILE=/run/secrets/foo`. Setting both is an error so that a
//! stale inline value never silently shadows a mounted secret file.

use std::path::PathBuf;

use magllama_common_secret::SecretString;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SecretEnvError {
	#[error("both {var} and {var}_FILE are set; use only one")]
	Ambiguous { var: String },

	#[error("failed to read {var}_FILE at {path}: {source}")]
	FileRead {
		var: String,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Load a secret from `var` or from the file named by `{var}_FILE`.
///
/// Returns `Ok(None)` when neither is set or the value is empty. Trailing
/// newlines from secret files are stripped.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");
	let inline = std::env::var(var).ok().filter(|v| !v.is_empty());
	let file = std::env::var(&file_var).ok().filter(|v| !v.is_empty());

	match (inline, file) {
		(Some(_), Some(_)) => Err(SecretEnvError::Ambiguous {
			var: var.to_string(),
		}),
		(Some(value), None) => {
			debug!(var, "loaded secret from environment");
			Ok(Some(SecretString::new(value)))
		}
		(None, Some(path)) => {
			let path = PathBuf::from(path);
			let content =
				std::fs::read_to_string(&path).map_err(|source| SecretEnvError::FileRead {
					var: var.to_string(),
					path: path.clone(),
					source,
				})?;
			let trimmed = content.trim_end_matches(['\n', '\r']).to_string();
			debug!(var, path = %path.display(), "loaded secret from file");
			if trimmed.is_empty() {
				Ok(None)
			} else {
				Ok(Some(SecretString::new(trimmed)))
			}
		}
		(None, None) => Ok(None),
	}
}
