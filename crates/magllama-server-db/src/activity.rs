// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read side of the activity log. Writes go through the audit crate's
//! SQLite sink; this repository never updates or deletes rows.

use async_trait::async_trait;
use magllama_server_audit::{AuditEventType, AuditLogEntry, AuditSeverity};
use magllama_server_auth::UserId;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{parse_id, parse_opt_id, parse_ts};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

/// Filters for [`ActivityLogRepository::query_logs`]. `None` matches anything.
#[derive(Debug, Clone, Default)]
pub struct ActivityLogQuery {
	pub user_id: Option<UserId>,
	pub action: Option<AuditEventType>,
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,
	pub limit: Option<u32>,
}

#[async_trait]
pub trait ActivityLogStore: Send + Sync {
	async fn query_logs(&self, query: &ActivityLogQuery) -> Result<Vec<AuditLogEntry>, DbError>;
	async fn count_logs(&self, query: &ActivityLogQuery) -> Result<i64, DbError>;
}

#[async_trait]
impl ActivityLogStore for ActivityLogRepository {
	async fn query_logs(&self, query: &ActivityLogQuery) -> Result<Vec<AuditLogEntry>, DbError> {
		self.query_logs(query).await
	}

	async fn count_logs(&self, query: &ActivityLogQuery) -> Result<i64, DbError> {
		self.count_logs(query).await
	}
}

#[derive(Clone)]
pub struct ActivityLogRepository {
	pool: SqlitePool,
}

impl ActivityLogRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Most recent entries first.
	#[tracing::instrument(skip(self))]
	pub async fn query_logs(&self, query: &ActivityLogQuery) -> Result<Vec<AuditLogEntry>, DbError> {
		let user_id = query.user_id.map(|u| u.to_string());
		let action = query.action.map(|a| a.as_str());
		let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

		let rows = sqlx::query(
			r#"
			SELECT id, timestamp, user_id, action, severity, resource_type, resource_id, details
			FROM activity_logs
			WHERE (?1 IS NULL OR user_id = ?1)
			  AND (?2 IS NULL OR action = ?2)
			  AND (?3 IS NULL OR resource_type = ?3)
			  AND (?4 IS NULL OR resource_id = ?4)
			ORDER BY timestamp DESC, id
			LIMIT ?5
			"#,
		)
		.bind(&user_id)
		.bind(action)
		.bind(&query.resource_type)
		.bind(&query.resource_id)
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_activity_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn count_logs(&self, query: &ActivityLogQuery) -> Result<i64, DbError> {
		let user_id = query.user_id.map(|u| u.to_string());
		let action = query.action.map(|a| a.as_str());

		let row = sqlx::query(
			r#"
			SELECT COUNT(*) AS count
			FROM activity_logs
			WHERE (?1 IS NULL OR user_id = ?1)
			  AND (?2 IS NULL OR action = ?2)
			  AND (?3 IS NULL OR resource_type = ?3)
			  AND (?4 IS NULL OR resource_id = ?4)
			"#,
		)
		.bind(&user_id)
		.bind(action)
		.bind(&query.resource_type)
		.bind(&query.resource_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(row.get("count"))
	}
}

fn parse_activity_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditLogEntry, DbError> {
	let id: String = row.get("id");
	let timestamp: String = row.get("timestamp");
	let action: String = row.get("action");
	let severity: String = row.get("severity");
	let details: String = row.get("details");

	Ok(AuditLogEntry {
		id: parse_id(&id, "activity log id")?,
		timestamp: parse_ts(&timestamp, "timestamp")?,
		event_type: action
			.parse::<AuditEventType>()
			.map_err(DbError::Internal)?,
		severity: severity
			.parse::<AuditSeverity>()
			.map_err(DbError::Internal)?,
		actor_user_id: parse_opt_id(row.get("user_id"), "user_id")?,
		resource_type: row.get("resource_type"),
		resource_id: row.get("resource_id"),
		details: serde_json::from_str(&details)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use magllama_server_audit::{AuditLogBuilder, AuditSink, SqliteAuditSink};
	use serde_json::json;

	#[tokio::test]
	async fn entries_written_by_sink_are_queryable() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone());
		let repo = ActivityLogRepository::new(pool);
		let alice = UserId::generate();
		let bob = UserId::generate();

		for (actor, event) in [
			(Some(alice), AuditEventType::PermissionDenied),
			(Some(alice), AuditEventType::RevealSecret),
			(Some(bob), AuditEventType::PermissionDenied),
			(None, AuditEventType::LoginFailed),
		] {
			let entry = AuditLogBuilder::new(event)
				.maybe_actor(actor)
				.details(json!({"permission": "reveal_secret"}))
				.build();
			sink.publish(&entry).await.unwrap();
		}

		let denied_for_alice = repo
			.query_logs(&ActivityLogQuery {
				user_id: Some(alice),
				action: Some(AuditEventType::PermissionDenied),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(denied_for_alice.len(), 1);
		assert_eq!(denied_for_alice[0].actor_user_id, Some(alice));
		assert_eq!(denied_for_alice[0].details["permission"], "reveal_secret");
		assert_eq!(denied_for_alice[0].severity, AuditSeverity::Warning);

		let all_denials = repo
			.count_logs(&ActivityLogQuery {
				action: Some(AuditEventType::PermissionDenied),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(all_denials, 2);

		let anonymous = repo
			.query_logs(&ActivityLogQuery {
				action: Some(AuditEventType::LoginFailed),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(anonymous.len(), 1);
		assert!(anonymous[0].actor_user_id.is_none());

		assert_eq!(repo.count_logs(&ActivityLogQuery::default()).await.unwrap(), 4);
	}

	#[tokio::test]
	async fn limit_is_applied() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone());
		let repo = ActivityLogRepository::new(pool);
		for _ in 0..5 {
			sink
				.publish(&AuditLogBuilder::new(AuditEventType::Login).build())
				.await
				.unwrap();
		}

		let limited = repo
			.query_logs(&ActivityLogQuery {
				limit: Some(2),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(limited.len(), 2);
	}
}
