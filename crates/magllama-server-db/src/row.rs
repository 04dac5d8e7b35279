// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column conversions shared by the `parse_*_row` functions.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings
//! (`2025-01-01T00:00:00.000000Z`) so that text comparison in SQL orders them
//! correctly.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use uuid::Uuid;

use crate::error::DbError;

/// Current time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
	Utc::now().trunc_subsecs(6)
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_opt_ts(
	value: Option<String>,
	column: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
	value.map(|s| parse_ts(&s, column)).transpose()
}

pub(crate) fn parse_id<T: From<Uuid>>(value: &str, column: &str) -> Result<T, DbError> {
	Uuid::parse_str(value)
		.map(T::from)
		.map_err(|e| DbError::Internal(format!("Invalid {column} UUID: {e}")))
}

pub(crate) fn parse_opt_id<T: From<Uuid>>(
	value: Option<String>,
	column: &str,
) -> Result<Option<T>, DbError> {
	value.map(|s| parse_id(&s, column)).transpose()
}
