// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only activity logging.
//!
//! Every permission denial, scope denial, failed authentication and sensitive
//! read or mutation in the access core is written through [`AuditLogger`].
//! Denials are recorded with [`AuditLogger::record`], which waits for the
//! durable sink; post-mutation entries use
//! [`AuditLogger::record_best_effort`], which reports failures to `tracing`
//! instead of the caller.
//!
//! Entries are scrubbed by [`redaction`] before any sink sees them.

pub mod error;
pub mod event;
pub mod logger;
pub mod redaction;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditEventType, AuditLogBuilder, AuditLogEntry, AuditSeverity};
pub use logger::AuditLogger;
pub use sink::{AuditSink, MemoryAuditSink};

#[cfg(feature = "sink-sqlite")]
pub use sink::SqliteAuditSink;
#[cfg(feature = "sink-tracing")]
pub use sink::TracingAuditSink;
