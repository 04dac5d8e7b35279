// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::{AuditEventType, AuditLogEntry};
use crate::sink::AuditSink;

/// In-process sink that keeps every entry. Used by tests and by embedders
/// that forward entries elsewhere.
///
/// Can be primed to fail the next N publishes to exercise retry handling.
#[derive(Default)]
pub struct MemoryAuditSink {
	entries: Mutex<Vec<AuditLogEntry>>,
	fail_next: AtomicU32,
	permanent: bool,
}

impl MemoryAuditSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Fail the next `count` publishes with a transient error.
	pub fn failing_transiently(count: u32) -> Self {
		Self {
			fail_next: AtomicU32::new(count),
			..Self::default()
		}
	}

	/// Fail every publish with a permanent error.
	pub fn failing_permanently() -> Self {
		Self {
			fail_next: AtomicU32::new(u32::MAX),
			permanent: true,
			..Self::default()
		}
	}

	pub fn entries(&self) -> Vec<AuditLogEntry> {
		self.entries
			.lock()
			.map(|guard| guard.clone())
			.unwrap_or_default()
	}

	pub fn actions(&self) -> Vec<AuditEventType> {
		self.entries().into_iter().map(|e| e.event_type).collect()
	}

	pub fn count_of(&self, event_type: AuditEventType) -> usize {
		self.entries()
			.iter()
			.filter(|e| e.event_type == event_type)
			.count()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
	fn name(&self) -> &str {
		"memory"
	}

	async fn publish(&self, entry: &AuditLogEntry) -> Result<(), AuditSinkError> {
		let remaining = self.fail_next.load(Ordering::SeqCst);
		if remaining > 0 {
			if self.permanent {
				return Err(AuditSinkError::Permanent("memory sink rejected entry".to_string()));
			}
			self.fail_next.store(remaining - 1, Ordering::SeqCst);
			return Err(AuditSinkError::Transient("memory sink busy".to_string()));
		}

		self.entries
			.lock()
			.map_err(|_| AuditSinkError::Permanent("memory sink poisoned".to_string()))?
			.push(entry.clone());
		Ok(())
	}
}
