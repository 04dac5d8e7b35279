// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::event::AuditLogEntry;

pub use crate::error::AuditSinkError;

mod memory;
#[cfg(feature = "sink-sqlite")]
mod sqlite;
#[cfg(feature = "sink-tracing")]
mod log;

pub use memory::MemoryAuditSink;
#[cfg(feature = "sink-sqlite")]
pub use sqlite::SqliteAuditSink;
#[cfg(feature = "sink-tracing")]
pub use log::TracingAuditSink;

/// Destination for activity log entries.
///
/// A sink reports [`AuditSinkError::Transient`] for failures worth retrying
/// (busy database, closed pool) and [`AuditSinkError::Permanent`] otherwise.
#[async_trait]
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;

	/// When `true`, a failure of this sink fails the whole write. Secondary
	/// sinks like the tracing mirror return `false`.
	fn is_durable(&self) -> bool {
		true
	}

	async fn publish(&self, entry: &AuditLogEntry) -> Result<(), AuditSinkError>;
}
