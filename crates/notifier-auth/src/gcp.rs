// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Google Cloud access tokens via `gcp_auth`.

use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use notifier_core::Context;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument};

use crate::error::AuthError;
use crate::source::{Token, TokenOptions, TokenSource};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Google credentials: application default credentials discovered on first
/// use, or an explicit service account key.
#[derive(Clone, Default)]
pub struct GcpSource {
	provider: Arc<OnceCell<Arc<dyn TokenProvider>>>,
}

impl std::fmt::Debug for GcpSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GcpSource")
			.field("initialized", &self.provider.initialized())
			.finish()
	}
}

impl GcpSource {
	/// Application default credentials.
	pub fn new() -> Self {
		Self::default()
	}

	/// Credentials from a service account JSON key.
	pub fn from_service_account_json(json: &str) -> Result<Self, AuthError> {
		let account = CustomServiceAccount::from_json(json)
			.map_err(|e| AuthError::invalid_config(format!("invalid service account key: {e}")))?;
		let provider: Arc<dyn TokenProvider> = Arc::new(account);
		Ok(Self {
			provider: Arc::new(OnceCell::new_with(Some(provider))),
		})
	}

	async fn provider(&self) -> Result<&Arc<dyn TokenProvider>, AuthError> {
		self
			.provider
			.get_or_try_init(|| async {
				debug!("initializing GCP authentication provider");
				gcp_auth::provider().await.map_err(|e| {
					error!(error = %e, "failed to initialize GCP auth");
					AuthError::Source {
						message: format!("GCP auth initialization failed: {e}"),
						retryable: false,
					}
				})
			})
			.await
	}
}

#[async_trait]
impl TokenSource for GcpSource {
	#[instrument(skip(self, ctx, opts))]
	async fn token(&self, ctx: &Context, opts: &TokenOptions) -> Result<Token, AuthError> {
		let provider = ctx.run(self.provider()).await??;

		let scopes: Vec<&str> = if opts.scopes.is_empty() {
			vec![CLOUD_PLATFORM_SCOPE]
		} else {
			opts.scopes.iter().map(String::as_str).collect()
		};

		let token = ctx.run(provider.token(&scopes)).await?.map_err(|e| {
			error!(error = %e, "failed to get GCP access token");
			AuthError::Source {
				message: format!("GCP token acquisition failed: {e}"),
				retryable: true,
			}
		})?;

		Ok(Token::new(token.as_str(), Some(token.expires_at())))
	}
}
