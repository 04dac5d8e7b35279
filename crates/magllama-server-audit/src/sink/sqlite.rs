// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditLogEntry;
use crate::sink::AuditSink;

/// Appends entries to the `activity_logs` table. Rows are never updated.
pub struct SqliteAuditSink {
	pool: SqlitePool,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		"sqlite"
	}

	async fn publish(&self, entry: &AuditLogEntry) -> Result<(), AuditSinkError> {
		let details_json = serde_json::to_string(&entry.details)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize details: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO activity_logs (
				id, timestamp, user_id, action, severity, resource_type, resource_id, details
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(entry.id.to_string())
		.bind(
			entry
				.timestamp
				.to_rfc3339_opts(SecondsFormat::Micros, true),
		)
		.bind(entry.actor_user_id.map(|u| u.to_string()))
		.bind(entry.action())
		.bind(entry.severity.to_string())
		.bind(&entry.resource_type)
		.bind(&entry.resource_id)
		.bind(&details_json)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}
