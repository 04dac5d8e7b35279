// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::env::load_secret_env;
use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, DatabaseConfigLayer, LogFormat, LoggingConfigLayer, SecretsConfigLayer,
	ENCRYPTION_KEY_ENV,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/magllama/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: MAGLLAMA_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			secrets: Some(load_secrets_from_env()?),
			logging: Some(load_logging_from_env()?),
			audit: Some(load_audit_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("MAGLLAMA_SERVER_DATABASE_URL").or_else(|| env_var("DATABASE_URL")),
		max_connections: env_u32("MAGLLAMA_SERVER_DATABASE_MAX_CONNECTIONS")?,
	})
}

fn load_secrets_from_env() -> Result<SecretsConfigLayer, ConfigError> {
	Ok(SecretsConfigLayer {
		encryption_key: load_secret_env(ENCRYPTION_KEY_ENV)
			.map_err(|e| ConfigError::Secret(e.to_string()))?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("MAGLLAMA_SERVER_LOG_FORMAT") {
		Some(v) => Some(v.parse::<LogFormat>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "MAGLLAMA_SERVER_LOG_FORMAT".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("MAGLLAMA_SERVER_LOG_LEVEL"),
		format,
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	Ok(AuditConfigLayer {
		retry_attempts: env_u32("MAGLLAMA_SERVER_AUDIT_RETRY_ATTEMPTS")?,
		retry_backoff_ms: env_u64("MAGLLAMA_SERVER_AUDIT_RETRY_BACKOFF_MS")?,
		tracing_sink: env_bool("MAGLLAMA_SERVER_AUDIT_TRACING_SINK"),
	})
}
