// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Azure managed identity tokens from the instance metadata service.

use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_common_http::{ClientOptions, OutboundRequest, RetryConfig, Transport};
use notifier_core::Context;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::AuthError;
use crate::source::{Token, TokenOptions, TokenSource};

pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";

/// Fetches managed identity tokens from the Azure instance metadata service.
#[derive(Debug, Clone)]
pub struct AzureImdsSource {
	transport: Transport,
	endpoint: String,
	client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImdsResponse {
	access_token: String,
	#[serde(default)]
	expires_on: Option<String>,
	#[serde(default)]
	expires_in: Option<String>,
}

/// `https://eventhubs.azure.net/.default` → `https://eventhubs.azure.net`
fn scope_to_resource(scope: &str) -> &str {
	scope.strip_suffix("/.default").unwrap_or(scope)
}

fn parse_expiry(resp: &ImdsResponse, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
	if let Some(on) = resp.expires_on.as_deref().and_then(|v| v.parse::<i64>().ok()) {
		return DateTime::from_timestamp(on, 0);
	}
	resp
		.expires_in
		.as_deref()
		.and_then(|v| v.parse::<i64>().ok())
		.map(|secs| now + chrono::Duration::seconds(secs))
}

impl AzureImdsSource {
	pub fn new(transport: Transport) -> Self {
		Self {
			transport,
			endpoint: DEFAULT_IMDS_ENDPOINT.to_string(),
			client_id: None,
		}
	}

	/// A source using the default endpoint and `AZURE_CLIENT_ID` for
	/// user-assigned identities.
	pub fn from_env() -> Result<Self, AuthError> {
		let transport = Transport::new(&ClientOptions::from_env(), RetryConfig::from_env())?;
		let mut source = Self::new(transport);
		source.client_id = env::var(ENV_CLIENT_ID).ok().filter(|v| !v.is_empty());
		Ok(source)
	}

	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();
		self
	}

	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());
		self
	}
}

#[async_trait]
impl TokenSource for AzureImdsSource {
	#[instrument(skip(self, ctx, opts), fields(scopes = ?opts.scopes))]
	async fn token(&self, ctx: &Context, opts: &TokenOptions) -> Result<Token, AuthError> {
		let scope = opts
			.scopes
			.first()
			.ok_or_else(|| AuthError::invalid_config("a token scope is required"))?;
		let resource = scope_to_resource(scope);

		let mut url = format!(
			"{}?api-version={IMDS_API_VERSION}&resource={}",
			self.endpoint,
			urlencoding::encode(resource)
		);
		if let Some(client_id) = &self.client_id {
			url.push_str(&format!("&client_id={}", urlencoding::encode(client_id)));
		}

		let transport = match opts.proxy.as_deref().filter(|p| !p.is_empty()) {
			Some(proxy) => Transport::new(
				&ClientOptions::default().with_proxy(proxy),
				self.transport.retry_config().clone(),
			)?,
			None => self.transport.clone(),
		};

		let req = OutboundRequest::get(url).header("Metadata", "true");
		let resp: ImdsResponse = transport
			.send(ctx, &req)
			.await?
			.json()
			.map_err(|e| AuthError::InvalidResponse(format!("IMDS response: {e}")))?;

		let expires_at = parse_expiry(&resp, Utc::now());
		debug!(resource, expires_at = ?expires_at, "obtained managed identity token");

		Ok(Token::new(resp.access_token, expires_at))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_default_suffix() {
		assert_eq!(
			scope_to_resource("https://eventhubs.azure.net/.default"),
			"https://eventhubs.azure.net"
		);
		assert_eq!(
			scope_to_resource("499b84ac-1321-427f-aa17-267ca6975798"),
			"499b84ac-1321-427f-aa17-267ca6975798"
		);
	}

	#[test]
	fn expires_on_takes_precedence() {
		let resp = ImdsResponse {
			access_token: String::new(),
			expires_on: Some("1714564800".to_string()),
			expires_in: Some("60".to_string()),
		};
		let expiry = parse_expiry(&resp, Utc::now()).unwrap();
		assert_eq!(expiry.timestamp(), 1_714_564_800);
	}

	#[test]
	fn falls_back_to_expires_in() {
		let now = Utc::now();
		let resp = ImdsResponse {
			access_token: String::new(),
			expires_on: None,
			expires_in: Some("3599".to_string()),
		};
		assert_eq!(
			parse_expiry(&resp, now),
			Some(now + chrono::Duration::seconds(3599))
		);
	}

	#[test]
	fn no_expiry_fields() {
		let resp = ImdsResponse {
			access_token: String::new(),
			expires_on: None,
			expires_in: None,
		};
		assert!(parse_expiry(&resp, Utc::now()).is_none());
	}
}
