// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use magllama_server_auth::UserId;
use magllama_server_config::AuditConfig;
use tracing::{error, instrument, warn};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEventType, AuditLogBuilder, AuditLogEntry};
use crate::redaction::redact_entry;
use crate::sink::AuditSink;

/// Synchronous, retrying front door to the activity log.
///
/// Entries are redacted once, then published to every sink in order. A
/// transient sink failure is retried with exponential backoff plus jitter up
/// to `retry_attempts` times. Only durable sinks can fail a write.
#[derive(Clone)]
pub struct AuditLogger {
	sinks: Vec<Arc<dyn AuditSink>>,
	retry_attempts: u32,
	retry_backoff: Duration,
}

impl AuditLogger {
	pub fn new(sinks: Vec<Arc<dyn AuditSink>>, config: &AuditConfig) -> Self {
		Self {
			sinks,
			retry_attempts: config.retry_attempts.max(1),
			retry_backoff: Duration::from_millis(config.retry_backoff_ms),
		}
	}

	/// Standard sink set: the `activity_logs` table, mirrored to `tracing`
	/// when enabled.
	#[cfg(feature = "sink-sqlite")]
	pub fn for_pool(pool: sqlx::SqlitePool, config: &AuditConfig) -> Self {
		let mut sinks: Vec<Arc<dyn AuditSink>> =
			vec![Arc::new(crate::sink::SqliteAuditSink::new(pool))];
		sinks.extend(tracing_mirror(config.tracing_sink));
		Self::new(sinks, config)
	}

	/// Write an entry and wait for every durable sink to accept it.
	///
	/// Used for denials, which must be on record before the caller sees the
	/// error.
	#[instrument(skip(self, entry), fields(action = %entry.event_type, id = %entry.id))]
	pub async fn record(&self, mut entry: AuditLogEntry) -> AuditResult<()> {
		if self.sinks.is_empty() {
			return Err(AuditError::NoSinks);
		}

		redact_entry(&mut entry);

		let mut first_failure = None;
		for sink in &self.sinks {
			match self.publish_with_retry(sink.as_ref(), &entry).await {
				Ok(()) => {}
				Err(e) if sink.is_durable() => {
					if first_failure.is_none() {
						first_failure = Some(e);
					}
				}
				Err(e) => {
					warn!(sink = sink.name(), error = %e, "non-durable audit sink failed");
				}
			}
		}

		match first_failure {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	/// Write an entry after a successful mutation. Failures are reported to
	/// the process log and never returned.
	pub async fn record_best_effort(&self, entry: AuditLogEntry) {
		let action = entry.event_type;
		let id = entry.id;
		if let Err(e) = self.record(entry).await {
			error!(%action, %id, error = %e, "failed to write audit entry");
		}
	}

	/// Convenience for the common shape: actor, action, optional resource and
	/// a JSON details payload.
	pub async fn log(
		&self,
		actor: Option<UserId>,
		event_type: AuditEventType,
		resource: Option<(&str, String)>,
		details: serde_json::Value,
	) -> AuditResult<()> {
		self.record(build(actor, event_type, resource, details)).await
	}

	pub async fn log_best_effort(
		&self,
		actor: Option<UserId>,
		event_type: AuditEventType,
		resource: Option<(&str, String)>,
		details: serde_json::Value,
	) {
		self
			.record_best_effort(build(actor, event_type, resource, details))
			.await
	}

	async fn publish_with_retry(
		&self,
		sink: &dyn AuditSink,
		entry: &AuditLogEntry,
	) -> AuditResult<()> {
		let mut attempt = 0u32;
		loop {
			attempt += 1;
			match sink.publish(entry).await {
				Ok(()) => return Ok(()),
				Err(e) if e.is_transient() && attempt < self.retry_attempts => {
					let delay = self.backoff_for(attempt);
					warn!(
						sink = sink.name(),
						attempt,
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"audit sink publish failed, retrying"
					);
					tokio::time::sleep(delay).await;
				}
				Err(source) => {
					return Err(AuditError::SinkError {
						sink: sink.name().to_string(),
						attempts: attempt,
						source,
					})
				}
			}
		}
	}

	fn backoff_for(&self, attempt: u32) -> Duration {
		let base = self.retry_backoff.as_millis() as u64;
		if base == 0 {
			return Duration::ZERO;
		}
		let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
		let jitter = fastrand::u64(0..=base / 2);
		Duration::from_millis(exp.saturating_add(jitter))
	}
}

impl std::fmt::Debug for AuditLogger {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuditLogger")
			.field(
				"sinks",
				&self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
			)
			.field("retry_attempts", &self.retry_attempts)
			.field("retry_backoff", &self.retry_backoff)
			.finish()
	}
}

fn build(
	actor: Option<UserId>,
	event_type: AuditEventType,
	resource: Option<(&str, String)>,
	details: serde_json::Value,
) -> AuditLogEntry {
	let mut builder = AuditLogBuilder::new(event_type)
		.maybe_actor(actor)
		.details(details);
	if let Some((resource_type, resource_id)) = resource {
		builder = builder.resource(resource_type, resource_id);
	}
	builder.build()
}

#[cfg(feature = "sink-tracing")]
fn tracing_mirror(enabled: bool) -> Option<Arc<dyn AuditSink>> {
	enabled.then(|| Arc::new(crate::sink::TracingAuditSink::new()) as Arc<dyn AuditSink>)
}

#[cfg(not(feature = "sink-tracing"))]
fn tracing_mirror(_enabled: bool) -> Option<Arc<dyn AuditSink>> {
	None
}
