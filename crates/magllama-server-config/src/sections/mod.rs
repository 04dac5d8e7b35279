// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod audit;
mod database;
mod logging;
mod secrets;

pub use audit::{AuditConfig, AuditConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use secrets::{
	decode_encryption_key, SecretsConfig, SecretsConfigLayer, ENCRYPTION_KEY_ENV,
	ENCRYPTION_KEY_LEN,
};
