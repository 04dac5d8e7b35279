// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration as produced by a single source.

use serde::Deserialize;

use crate::sections::{AuditConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, SecretsConfigLayer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub secrets: Option<SecretsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub audit: Option<AuditConfigLayer>,
}

fn merge_section<T>(target: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (target.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *target = Some(incoming),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Merge `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.secrets, other.secrets, SecretsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.audit, other.audit, AuditConfigLayer::merge);
	}
}
