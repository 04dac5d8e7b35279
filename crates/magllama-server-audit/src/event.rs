// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for the activity log.
//!
//! - [`AuditEventType`]: every action the core records; its snake_case form is
//!   the `action` column of `activity_logs`
//! - [`AuditSeverity`]: RFC 5424-compatible severity levels
//! - [`AuditLogEntry`]: one append-only activity log row
//! - [`AuditLogBuilder`]: fluent API for constructing entries

use chrono::{DateTime, Utc};
use magllama_server_auth::{ActivityLogId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Types of events that can be recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Access control denials
	PermissionDenied,
	ProjectAccessDenied,
	SecretAccessDenied,

	// Authentication
	Login,
	LoginFailed,
	ApiKeyAuthFailed,

	// API keys
	ApiKeyCreated,
	ApiKeyRevoked,

	// Secrets
	CreateSecret,
	GetSecret,
	RevealSecret,
	UpdateSecret,
	RotateSecret,
	RevokeSecret,

	// Projects
	CreateProject,
	AddProjectMember,
	InactivateProject,

	// Global roles
	RoleAssigned,
	RoleUnassigned,
}

impl AuditEventType {
	pub fn all() -> &'static [AuditEventType] {
		&[
			AuditEventType::PermissionDenied,
			AuditEventType::ProjectAccessDenied,
			AuditEventType::SecretAccessDenied,
			AuditEventType::Login,
			AuditEventType::LoginFailed,
			AuditEventType::ApiKeyAuthFailed,
			AuditEventType::ApiKeyCreated,
			AuditEventType::ApiKeyRevoked,
			AuditEventType::CreateSecret,
			AuditEventType::GetSecret,
			AuditEventType::RevealSecret,
			AuditEventType::UpdateSecret,
			AuditEventType::RotateSecret,
			AuditEventType::RevokeSecret,
			AuditEventType::CreateProject,
			AuditEventType::AddProjectMember,
			AuditEventType::InactivateProject,
			AuditEventType::RoleAssigned,
			AuditEventType::RoleUnassigned,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventType::PermissionDenied => "permission_denied",
			AuditEventType::ProjectAccessDenied => "project_access_denied",
			AuditEventType::SecretAccessDenied => "secret_access_denied",
			AuditEventType::Login => "login",
			AuditEventType::LoginFailed => "login_failed",
			AuditEventType::ApiKeyAuthFailed => "api_key_auth_failed",
			AuditEventType::ApiKeyCreated => "api_key_created",
			AuditEventType::ApiKeyRevoked => "api_key_revoked",
			AuditEventType::CreateSecret => "create_secret",
			AuditEventType::GetSecret => "get_secret",
			AuditEventType::RevealSecret => "reveal_secret",
			AuditEventType::UpdateSecret => "update_secret",
			AuditEventType::RotateSecret => "rotate_secret",
			AuditEventType::RevokeSecret => "revoke_secret",
			AuditEventType::CreateProject => "create_project",
			AuditEventType::AddProjectMember => "add_project_member",
			AuditEventType::InactivateProject => "inactivate_project",
			AuditEventType::RoleAssigned => "role_assigned",
			AuditEventType::RoleUnassigned => "role_unassigned",
		}
	}

	/// Returns the default severity for this event type.
	///
	/// - `Warning`: access denials and failed authentication
	/// - `Notice`: reveals, revocations, and privilege changes
	/// - `Info`: everything else
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditEventType::PermissionDenied
			| AuditEventType::ProjectAccessDenied
			| AuditEventType::SecretAccessDenied
			| AuditEventType::LoginFailed
			| AuditEventType::ApiKeyAuthFailed => AuditSeverity::Warning,

			AuditEventType::RevealSecret
			| AuditEventType::RevokeSecret
			| AuditEventType::ApiKeyRevoked
			| AuditEventType::InactivateProject
			| AuditEventType::RoleAssigned
			| AuditEventType::RoleUnassigned
			| AuditEventType::AddProjectMember => AuditSeverity::Notice,

			AuditEventType::Login
			| AuditEventType::ApiKeyCreated
			| AuditEventType::CreateSecret
			| AuditEventType::GetSecret
			| AuditEventType::UpdateSecret
			| AuditEventType::RotateSecret
			| AuditEventType::CreateProject => AuditSeverity::Info,
		}
	}
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditEventType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		AuditEventType::all()
			.iter()
			.find(|t| t.as_str() == s)
			.copied()
			.ok_or_else(|| format!("unknown audit event type '{s}'"))
	}
}

/// Severity levels following RFC 5424 syslog conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

impl FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(AuditSeverity::Debug),
			"info" => Ok(AuditSeverity::Info),
			"notice" => Ok(AuditSeverity::Notice),
			"warning" => Ok(AuditSeverity::Warning),
			"error" => Ok(AuditSeverity::Error),
			"critical" => Ok(AuditSeverity::Critical),
			other => Err(format!("unknown severity '{other}'")),
		}
	}
}

/// One row of the append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: ActivityLogId,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub severity: AuditSeverity,
	/// `None` for unauthenticated attempts, e.g. a failed login against an
	/// unknown username.
	pub actor_user_id: Option<UserId>,
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,
	pub details: serde_json::Value,
}

impl AuditLogEntry {
	pub fn builder(event_type: AuditEventType) -> AuditLogBuilder {
		AuditLogBuilder::new(event_type)
	}

	/// The free-form action tag stored in `activity_logs.action`.
	pub fn action(&self) -> &'static str {
		self.event_type.as_str()
	}
}

#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
	event_type: AuditEventType,
	severity: Option<AuditSeverity>,
	actor_user_id: Option<UserId>,
	resource_type: Option<String>,
	resource_id: Option<String>,
	details: serde_json::Value,
}

impl AuditLogBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			severity: None,
			actor_user_id: None,
			resource_type: None,
			resource_id: None,
			details: serde_json::Value::Null,
		}
	}

	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn actor(mut self, user_id: UserId) -> Self {
		self.actor_user_id = Some(user_id);
		self
	}

	/// Set the actor when one is known; unauthenticated callers pass `None`.
	pub fn maybe_actor(mut self, user_id: Option<UserId>) -> Self {
		self.actor_user_id = user_id;
		self
	}

	pub fn resource(
		mut self,
		resource_type: impl Into<String>,
		resource_id: impl ToString,
	) -> Self {
		self.resource_type = Some(resource_type.into());
		self.resource_id = Some(resource_id.to_string());
		self
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn build(self) -> AuditLogEntry {
		AuditLogEntry {
			id: ActivityLogId::generate(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			severity: self
				.severity
				.unwrap_or_else(|| self.event_type.default_severity()),
			actor_user_id: self.actor_user_id,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			details: self.details,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn action_tags_match_activity_log_vocabulary() {
		assert_eq!(AuditEventType::PermissionDenied.to_string(), "permission_denied");
		assert_eq!(
			AuditEventType::ProjectAccessDenied.to_string(),
			"project_access_denied"
		);
		assert_eq!(AuditEventType::GetSecret.to_string(), "get_secret");
		assert_eq!(AuditEventType::RevealSecret.to_string(), "reveal_secret");
	}

	#[test]
	fn every_event_type_parses_back() {
		for event_type in AuditEventType::all() {
			assert_eq!(event_type.as_str().parse::<AuditEventType>(), Ok(*event_type));
		}
		assert!("nonsense".parse::<AuditEventType>().is_err());
	}

	#[test]
	fn denials_are_warnings() {
		let entry = AuditLogBuilder::new(AuditEventType::PermissionDenied).build();
		assert_eq!(entry.severity, AuditSeverity::Warning);
	}

	#[test]
	fn custom_severity_overrides_default() {
		let entry = AuditLogBuilder::new(AuditEventType::GetSecret)
			.severity(AuditSeverity::Critical)
			.build();
		assert_eq!(entry.severity, AuditSeverity::Critical);
	}

	#[test]
	fn builder_sets_all_fields() {
		let user = UserId::generate();
		let entry = AuditLogBuilder::new(AuditEventType::RevealSecret)
			.actor(user)
			.resource("secret", "sec-123")
			.details(json!({"name": "db_pass"}))
			.build();

		assert_eq!(entry.actor_user_id, Some(user));
		assert_eq!(entry.resource_type.as_deref(), Some("secret"));
		assert_eq!(entry.resource_id.as_deref(), Some("sec-123"));
		assert_eq!(entry.details["name"], "db_pass");
		assert_eq!(entry.action(), "reveal_secret");
	}

	#[test]
	fn maybe_actor_allows_anonymous() {
		let entry = AuditLogBuilder::new(AuditEventType::LoginFailed)
			.maybe_actor(None)
			.build();
		assert!(entry.actor_user_id.is_none());
	}

	#[test]
	fn generates_unique_ids() {
		let a = AuditLogBuilder::new(AuditEventType::Login).build();
		let b = AuditLogBuilder::new(AuditEventType::Login).build();
		assert_ne!(a.id, b.id);
	}

	fn arb_severity() -> impl Strategy<Value = AuditSeverity> {
		prop_oneof![
			Just(AuditSeverity::Debug),
			Just(AuditSeverity::Info),
			Just(AuditSeverity::Notice),
			Just(AuditSeverity::Warning),
			Just(AuditSeverity::Error),
			Just(AuditSeverity::Critical),
		]
	}

	proptest! {
		#[test]
		fn severity_ordering_is_total(a in arb_severity(), b in arb_severity()) {
			prop_assert!(a <= b || b <= a);
		}

		#[test]
		fn severity_parses_from_display(s in arb_severity()) {
			prop_assert_eq!(s.to_string().parse::<AuditSeverity>().unwrap(), s);
		}
	}
}
