// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the magllama access core.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`MAGLLAMA_SERVER_*`)
//! - `*_FILE` indirection for secrets
//!
//! The secrets encryption key has no default. Loading fails with
//! [`ConfigError::MissingRequired`] when it is absent, which the server binary
//! treats as a fatal startup error.
//!
//! # Usage
//!
//! ```ignore
//! use magllama_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("database: {}", config.database.url);
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub secrets: SecretsConfig,
	pub logging: LoggingConfig,
	pub audit: AuditConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`MAGLLAMA_SERVER_*`)
/// 2. Config file (`/etc/magllama/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let secrets = layer.secrets.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();

	validate_config(&database)?;

	info!(
		database = %database.url,
		max_connections = database.max_connections,
		log_level = %logging.level,
		audit_retry_attempts = audit.retry_attempts,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		secrets,
		logging,
		audit,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(database: &DatabaseConfig) -> Result<(), ConfigError> {
	if !database.url.starts_with("sqlite:") {
		return Err(ConfigError::Validation(format!(
			"database.url must be a sqlite: URL, got '{}'",
			database.url
		)));
	}

	Ok(())
}
