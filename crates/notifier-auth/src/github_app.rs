// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitHub App installation tokens.
//!
//! An installation token is obtained by signing an app JWT, exchanging it at
//! `POST /app/installations/{id}/access_tokens`, and resolving the app slug
//! through `GET /app`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, SecretString};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::AuthError;
use crate::jwt::generate_app_jwt;
use crate::source::Token;

pub const KEY_APP_ID: &str = "githubAppID";
pub const KEY_INSTALLATION_ID: &str = "githubAppInstallationID";
pub const KEY_PRIVATE_KEY: &str = "githubAppPrivateKey";
pub const KEY_BASE_URL: &str = "githubAppBaseURL";

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";

/// GitHub App credentials taken from a provider's secret data.
#[derive(Clone)]
pub struct GithubAppConfig {
	app_id: u64,
	installation_id: u64,
	private_key: SecretString,
	base_url: String,
}

impl fmt::Debug for GithubAppConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GithubAppConfig")
			.field("app_id", &self.app_id)
			.field("installation_id", &self.installation_id)
			.field("private_key", &self.private_key)
			.field("base_url", &self.base_url)
			.finish()
	}
}

fn parse_id(data: &BTreeMap<String, String>, key: &str) -> Result<u64, AuthError> {
	let raw = data
		.get(key)
		.map(|v| v.trim())
		.filter(|v| !v.is_empty())
		.ok_or_else(|| AuthError::invalid_config(format!("{key} is required")))?;
	raw
		.parse()
		.map_err(|_| AuthError::invalid_config(format!("{key} must be numeric, got '{raw}'")))
}

impl GithubAppConfig {
	pub fn new(app_id: u64, installation_id: u64, private_key: impl Into<String>) -> Self {
		Self {
			app_id,
			installation_id,
			private_key: SecretString::new(private_key.into()),
			base_url: DEFAULT_BASE_URL.to_string(),
		}
	}

	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into().trim_end_matches('/').to_string();
		self
	}

	/// Read app credentials from secret data.
	///
	/// Returns `Ok(None)` when no app ID is present, so callers can fall
	/// back to a static token.
	pub fn from_secret_data(data: &BTreeMap<String, String>) -> Result<Option<Self>, AuthError> {
		if data.get(KEY_APP_ID).map_or(true, |v| v.trim().is_empty()) {
			return Ok(None);
		}

		let app_id = parse_id(data, KEY_APP_ID)?;
		let installation_id = parse_id(data, KEY_INSTALLATION_ID)?;
		let private_key = data
			.get(KEY_PRIVATE_KEY)
			.filter(|v| !v.trim().is_empty())
			.ok_or_else(|| AuthError::invalid_config(format!("{KEY_PRIVATE_KEY} is required")))?;

		let mut config = Self::new(app_id, installation_id, private_key.clone());
		if let Some(base_url) = data.get(KEY_BASE_URL).filter(|v| !v.trim().is_empty()) {
			config = config.with_base_url(base_url.trim());
		}
		Ok(Some(config))
	}

	pub fn app_id(&self) -> u64 {
		self.app_id
	}

	pub fn installation_id(&self) -> u64 {
		self.installation_id
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}
}

/// An installation access token and the app it belongs to.
#[derive(Clone)]
pub struct AppToken {
	pub token: SecretString,
	pub slug: String,
	pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AppToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AppToken")
			.field("token", &self.token)
			.field("slug", &self.slug)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

impl From<AppToken> for Token {
	fn from(app: AppToken) -> Self {
		Token::new(app.token.expose().clone(), Some(app.expires_at))
	}
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
	token: String,
	expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AppResponse {
	slug: String,
}

/// Exchange an app JWT for an installation token and look up the app slug.
#[instrument(skip(ctx, transport, config), fields(app_id = config.app_id, installation_id = config.installation_id))]
pub async fn fetch_app_token(
	ctx: &Context,
	transport: &Transport,
	config: &GithubAppConfig,
) -> Result<AppToken, AuthError> {
	let jwt = generate_app_jwt(config.app_id, config.private_key.expose())?;

	let token_req = OutboundRequest::post(format!(
		"{}/app/installations/{}/access_tokens",
		config.base_url, config.installation_id
	))
	.bearer_auth(&jwt)
	.header("Accept", ACCEPT)
	.header("X-GitHub-Api-Version", API_VERSION);
	let access: AccessTokenResponse = transport
		.send(ctx, &token_req)
		.await?
		.json()
		.map_err(|e| AuthError::InvalidResponse(format!("access token response: {e}")))?;

	let app_req = OutboundRequest::get(format!("{}/app", config.base_url))
		.bearer_auth(&jwt)
		.header("Accept", ACCEPT)
		.header("X-GitHub-Api-Version", API_VERSION);
	let app: AppResponse = transport
		.send(ctx, &app_req)
		.await?
		.json()
		.map_err(|e| AuthError::InvalidResponse(format!("app response: {e}")))?;

	info!(slug = %app.slug, expires_at = %access.expires_at, "installation token issued");

	Ok(AppToken {
		token: SecretString::new(access.token),
		slug: app.slug,
		expires_at: access.expires_at,
	})
}
