// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The contract between notifiers and credential providers.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_core::{Context, SecretString};

use crate::error::AuthError;

/// Inputs to a managed/workload identity token exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenOptions {
	/// OAuth scopes (Azure resource `.default` scopes, Google scopes).
	pub scopes: Vec<String>,
	pub proxy: Option<String>,
	pub service_account_name: Option<String>,
	pub service_account_namespace: Option<String>,
	pub provider_name: Option<String>,
	pub provider_namespace: Option<String>,
}

impl TokenOptions {
	pub fn with_scope(scope: impl Into<String>) -> Self {
		Self {
			scopes: vec![scope.into()],
			..Self::default()
		}
	}
}

/// A short-lived access token.
#[derive(Clone)]
pub struct Token {
	value: SecretString,
	expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Token")
			.field("value", &self.value)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

impl Token {
	pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
		Self {
			value: SecretString::new(value.into()),
			expires_at,
		}
	}

	/// The token's string form, ready for an `Authorization` header.
	pub fn as_str(&self) -> &str {
		self.value.expose()
	}

	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.expires_at
	}
}

/// A provider of short-lived tokens.
///
/// Implementations perform the exchange only; caching is the job of
/// [`crate::TokenCache`].
#[async_trait]
pub trait TokenSource: Send + Sync {
	async fn token(&self, ctx: &Context, opts: &TokenOptions) -> Result<Token, AuthError>;
}
