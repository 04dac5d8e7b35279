// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration.

use serde::Deserialize;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
}

impl std::str::FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"pretty" | "text" => Ok(LogFormat::Pretty),
			"json" => Ok(LogFormat::Json),
			other => Err(format!("unknown log format '{other}'")),
		}
	}
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
	/// `EnvFilter` directive used when `RUST_LOG` is not set.
	pub level: String,
	pub format: LogFormat,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Pretty,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<LogFormat>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		let defaults = LoggingConfig::default();
		LoggingConfig {
			level: self.level.unwrap_or(defaults.level),
			format: self.format.unwrap_or(defaults.format),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_to_info_pretty() {
		let config = LoggingConfigLayer::default().finalize();
		assert_eq!(config.level, "info");
		assert_eq!(config.format, LogFormat::Pretty);
	}

	#[test]
	fn parses_format_case_insensitively() {
		assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
		assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
		assert!("yaml".parse::<LogFormat>().is_err());
	}
}
