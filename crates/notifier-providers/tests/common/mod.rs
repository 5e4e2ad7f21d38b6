// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use notifier_auth::{AuthError, Token, TokenCache, TokenOptions, TokenSource};
use notifier_common_http::RetryConfig;
use notifier_core::{Context, Event};
use notifier_providers::NotifierOptions;
use serde_json::json;

pub const SHA: &str = "69b59063470310ebbd88a9156325322a124e55a3";

pub fn event() -> Event {
	serde_json::from_value(json!({
		"involvedObject": {
			"kind": "Kustomization",
			"namespace": "flux-system",
			"name": "apps"
		},
		"severity": "info",
		"timestamp": "2024-05-01T12:00:00Z",
		"message": "m",
		"reason": "ReconciliationSucceeded",
		"metadata": {
			"revision": format!("main@sha1:{SHA}")
		},
		"reportingController": "kustomize-controller"
	}))
	.unwrap()
}

pub fn no_retry() -> RetryConfig {
	RetryConfig {
		max_attempts: 1,
		base_delay: Duration::from_millis(1),
		max_delay: Duration::from_millis(1),
		backoff_factor: 1.0,
		jitter: false,
	}
}

/// Options isolated from the process-wide token cache.
pub fn options(url: impl Into<String>) -> NotifierOptions {
	NotifierOptions::new(url)
		.with_provider("test", "flux-system")
		.with_token_cache(Arc::new(TokenCache::new()))
		.with_retry(no_retry())
}

/// Token source that counts calls and hands out a distinct token each time.
/// The delay honors the context it is called with.
#[derive(Default)]
pub struct CountingSource {
	pub calls: AtomicU32,
	pub delay: Duration,
}

impl CountingSource {
	pub fn slow(delay: Duration) -> Self {
		Self {
			calls: AtomicU32::new(0),
			delay,
		}
	}

	pub fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl TokenSource for CountingSource {
	async fn token(&self, ctx: &Context, _opts: &TokenOptions) -> Result<Token, AuthError> {
		let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		ctx.sleep(self.delay).await?;
		Ok(Token::new(
			format!("token-{n}"),
			Some(Utc::now() + chrono::Duration::hours(1)),
		))
	}
}
