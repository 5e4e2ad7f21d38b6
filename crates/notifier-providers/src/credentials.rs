// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cached access tokens for providers that authenticate with a workload
//! identity or a GitHub App instead of a static secret.

use std::sync::Arc;

use notifier_auth::{
	fetch_app_token, GithubAppConfig, InvolvedObject, Token, TokenCache, TokenOptions, TokenSource,
};
use notifier_common_http::Transport;
use notifier_core::{Context, SecretString};

use crate::error::NotifyError;
use crate::options::NotifierOptions;

/// A token source bound to one provider object's cache entry.
#[derive(Clone)]
pub(crate) struct CachedToken {
	cache: Arc<TokenCache>,
	key: InvolvedObject,
	source: Arc<dyn TokenSource>,
	options: TokenOptions,
}

impl std::fmt::Debug for CachedToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CachedToken")
			.field("key", &self.key)
			.field("scopes", &self.options.scopes)
			.finish()
	}
}

impl CachedToken {
	/// Use the injected token source when present, `default_source` otherwise.
	pub(crate) fn new<F>(opts: &NotifierOptions, scope: &str, default_source: F) -> Result<Self, NotifyError>
	where
		F: FnOnce() -> Result<Arc<dyn TokenSource>, NotifyError>,
	{
		let source = match &opts.token_source {
			Some(source) => Arc::clone(source),
			None => default_source()?,
		};
		Ok(Self {
			cache: opts.token_cache(),
			key: opts.cache_key(),
			source,
			options: opts.token_options(scope),
		})
	}

	/// Fetch through the cache. Concurrent callers share one fetch, which
	/// runs detached from every caller's context.
	pub(crate) async fn get(&self, ctx: &Context) -> Result<Token, NotifyError> {
		let source = Arc::clone(&self.source);
		let options = self.options.clone();
		let token = self
			.cache
			.get_or_fetch(ctx, &self.key, move |fetch_ctx| async move {
				source.token(&fetch_ctx, &options).await
			})
			.await?;
		Ok(token)
	}

	pub(crate) fn invalidate(&self) {
		self.cache.invalidate(&self.key);
	}
}

/// GitHub credentials: a personal access token, or a GitHub App
/// installation token cached per provider object.
#[derive(Debug, Clone)]
pub(crate) enum GithubAuth {
	Token(SecretString),
	App {
		config: GithubAppConfig,
		cache: Arc<TokenCache>,
		key: InvolvedObject,
		transport: Transport,
	},
}

impl GithubAuth {
	/// The token wins when both a token and app secret data are present.
	pub(crate) fn from_options(opts: &NotifierOptions, transport: &Transport) -> Result<Self, NotifyError> {
		if let Some(token) = opts.token() {
			return Ok(Self::Token(SecretString::from(token)));
		}
		match GithubAppConfig::from_secret_data(&opts.secret_map())? {
			Some(config) => Ok(Self::App {
				config,
				cache: opts.token_cache(),
				key: opts.cache_key(),
				transport: transport.clone(),
			}),
			None => Err(NotifyError::invalid_config(
				"github requires a token or GitHub App secret data",
			)),
		}
	}

	pub(crate) fn is_app(&self) -> bool {
		matches!(self, Self::App { .. })
	}

	pub(crate) async fn token(&self, ctx: &Context) -> Result<String, NotifyError> {
		match self {
			Self::Token(token) => Ok(token.expose().clone()),
			Self::App {
				config,
				cache,
				key,
				transport,
			} => {
				let config = config.clone();
				let transport = transport.clone();
				let token = cache
					.get_or_fetch(ctx, key, move |fetch_ctx| async move {
						fetch_app_token(&fetch_ctx, &transport, &config).await.map(Token::from)
					})
					.await?;
				Ok(token.as_str().to_string())
			}
		}
	}

	/// Forget a cached app token after the API rejected it.
	pub(crate) fn invalidate(&self) {
		if let Self::App { cache, key, .. } = self {
			cache.invalidate(key);
		}
	}
}
