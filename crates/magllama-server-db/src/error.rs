// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use magllama_server_auth::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl DbError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			DbError::NotFound(_) => ErrorKind::NotFound,
			DbError::Conflict(_) => ErrorKind::Conflict,
			DbError::Sqlx(_)
			| DbError::Migrate(_)
			| DbError::Internal(_)
			| DbError::Serialization(_) => ErrorKind::Internal,
		}
	}

	/// Translate constraint violations into domain errors. `what` names the
	/// entity for the message.
	pub(crate) fn from_constraint(e: sqlx::Error, what: &str) -> Self {
		if let sqlx::Error::Database(db_err) = &e {
			if db_err.is_unique_violation() {
				return DbError::Conflict(format!("{what} already exists"));
			}
			if db_err.is_foreign_key_violation() {
				return DbError::NotFound(format!("{what} references a missing row"));
			}
		}
		DbError::Sqlx(e)
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
