// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use magllama_server_auth::ErrorKind;
use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
	#[error("sink '{sink}' error after {attempts} attempt(s): {source}")]
	SinkError {
		sink: String,
		attempts: u32,
		#[source]
		source: AuditSinkError,
	},

	#[error("no audit sinks configured")]
	NoSinks,
}

impl AuditError {
	pub fn kind(&self) -> ErrorKind {
		ErrorKind::Internal
	}
}

#[derive(Error, Debug, Clone)]
pub enum AuditSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}

impl AuditSinkError {
	pub fn is_transient(&self) -> bool {
		matches!(self, AuditSinkError::Transient(_))
	}
}
