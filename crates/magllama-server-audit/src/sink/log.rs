// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::{AuditLogEntry, AuditSeverity};
use crate::sink::AuditSink;

/// Mirrors activity log entries into the process log under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl TracingAuditSink {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn is_durable(&self) -> bool {
		false
	}

	async fn publish(&self, entry: &AuditLogEntry) -> Result<(), AuditSinkError> {
		let actor = entry.actor_user_id.map(|u| u.to_string());
		let details = entry.details.to_string();

		match entry.severity {
			AuditSeverity::Critical | AuditSeverity::Error => tracing::error!(
				target: "audit",
				id = %entry.id,
				action = entry.action(),
				actor = actor.as_deref(),
				resource_type = entry.resource_type.as_deref(),
				resource_id = entry.resource_id.as_deref(),
				details = %details,
				"audit event"
			),
			AuditSeverity::Warning => tracing::warn!(
				target: "audit",
				id = %entry.id,
				action = entry.action(),
				actor = actor.as_deref(),
				resource_type = entry.resource_type.as_deref(),
				resource_id = entry.resource_id.as_deref(),
				details = %details,
				"audit event"
			),
			AuditSeverity::Notice | AuditSeverity::Info => tracing::info!(
				target: "audit",
				id = %entry.id,
				action = entry.action(),
				actor = actor.as_deref(),
				resource_type = entry.resource_type.as_deref(),
				resource_id = entry.resource_id.as_deref(),
				details = %details,
				"audit event"
			),
			AuditSeverity::Debug => tracing::debug!(
				target: "audit",
				id = %entry.id,
				action = entry.action(),
				details = %details,
				"audit event"
			),
		}
		Ok(())
	}
}
