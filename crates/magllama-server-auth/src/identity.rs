// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity providers.
//!
//! The access core only consumes a resolved [`UserId`]. An
//! [`IdentityProvider`] turns presented [`Credentials`] into that id. The
//! password provider lives next to the credential store; OAuth2, LDAP and SAML
//! are extension points that currently report [`IdentityError::Unsupported`].

use async_trait::async_trait;
use magllama_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorKind;
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityProviderKind {
	Password,
	OAuth2,
	Ldap,
	Saml,
}

impl fmt::Display for IdentityProviderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IdentityProviderKind::Password => write!(f, "password"),
			IdentityProviderKind::OAuth2 => write!(f, "oauth2"),
			IdentityProviderKind::Ldap => write!(f, "ldap"),
			IdentityProviderKind::Saml => write!(f, "saml"),
		}
	}
}

/// Credentials presented at login.
#[derive(Debug)]
pub enum Credentials {
	Password {
		username: String,
		password: SecretString,
	},
	OAuth2 {
		provider: String,
		code: SecretString,
	},
	Ldap {
		username: String,
		password: SecretString,
	},
	Saml {
		assertion: SecretString,
	},
}

impl Credentials {
	pub fn kind(&self) -> IdentityProviderKind {
		match self {
			Credentials::Password { .. } => IdentityProviderKind::Password,
			Credentials::OAuth2 { .. } => IdentityProviderKind::OAuth2,
			Credentials::Ldap { .. } => IdentityProviderKind::Ldap,
			Credentials::Saml { .. } => IdentityProviderKind::Saml,
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
	/// Wrong username or password. Deliberately does not say which.
	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("identity provider '{0}' is not supported")]
	Unsupported(IdentityProviderKind),

	#[error("credentials of type '{got}' presented to the '{expected}' provider")]
	WrongProvider {
		expected: IdentityProviderKind,
		got: IdentityProviderKind,
	},

	#[error("identity provider failure: {0}")]
	Internal(String),
}

impl IdentityError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			IdentityError::InvalidCredentials => ErrorKind::Unauthorized,
			IdentityError::Unsupported(_) | IdentityError::WrongProvider { .. } => {
				ErrorKind::InvalidInput
			}
			IdentityError::Internal(_) => ErrorKind::Internal,
		}
	}
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
	fn kind(&self) -> IdentityProviderKind;

	async fn resolve(&self, credentials: &Credentials) -> Result<UserId, IdentityError>;
}

/// Placeholder for a federated provider that has not been integrated.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedProvider {
	kind: IdentityProviderKind,
}

impl UnsupportedProvider {
	pub fn oauth2() -> Self {
		Self {
			kind: IdentityProviderKind::OAuth2,
		}
	}

	pub fn ldap() -> Self {
		Self {
			kind: IdentityProviderKind::Ldap,
		}
	}

	pub fn saml() -> Self {
		Self {
			kind: IdentityProviderKind::Saml,
		}
	}
}

#[async_trait]
impl IdentityProvider for UnsupportedProvider {
	fn kind(&self) -> IdentityProviderKind {
		self.kind
	}

	async fn resolve(&self, _credentials: &Credentials) -> Result<UserId, IdentityError> {
		tracing::debug!(provider = %self.kind, "login attempted against unsupported provider");
		Err(IdentityError::Unsupported(self.kind))
	}
}
