// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Token sources and the cache against mock endpoints.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use notifier_auth::{
	fetch_app_token, AuthError, AzureImdsSource, GithubAppConfig, InvolvedObject, Token,
	TokenCache, TokenOptions, TokenSource,
};
use notifier_common_http::{ClientOptions, RetryConfig, Transport};
use notifier_core::Context;
use rsa::{pkcs8::EncodePrivateKey, RsaPrivateKey};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> Transport {
	Transport::new(&ClientOptions::default(), RetryConfig::no_retry()).unwrap()
}

fn private_key_pem() -> String {
	let mut rng = rand::thread_rng();
	RsaPrivateKey::new(&mut rng, 2048)
		.unwrap()
		.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
		.unwrap()
		.to_string()
}

#[tokio::test]
async fn github_app_token_exchange() {
	let server = MockServer::start().await;
	let expires_at = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();

	Mock::given(method("POST"))
		.and(path("/app/installations/456/access_tokens"))
		.and(header_exists("authorization"))
		.and(header("accept", "application/vnd.github+json"))
		.respond_with(
			ResponseTemplate::new(201).set_body_json(json!({"token": "ghs_abc", "expires_at": expires_at})),
		)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/app"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"slug": "flux-notifier"})))
		.expect(1)
		.mount(&server)
		.await;

	let config = GithubAppConfig::new(123, 456, private_key_pem()).with_base_url(server.uri());
	let app = fetch_app_token(&Context::background(), &transport(), &config)
		.await
		.unwrap();

	assert_eq!(app.token.expose(), "ghs_abc");
	assert_eq!(app.slug, "flux-notifier");
	assert!(app.expires_at > Utc::now());
}

#[tokio::test]
async fn github_app_rejected_credentials() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
		.mount(&server)
		.await;

	let config = GithubAppConfig::new(1, 2, private_key_pem()).with_base_url(server.uri());
	let err = fetch_app_token(&Context::background(), &transport(), &config)
		.await
		.unwrap_err();

	assert!(err.is_unauthorized());
}

#[tokio::test]
async fn imds_token_request() {
	let server = MockServer::start().await;
	let expires_on = (Utc::now() + chrono::Duration::hours(1)).timestamp();

	Mock::given(method("GET"))
		.and(path("/metadata/identity/oauth2/token"))
		.and(header("metadata", "true"))
		.and(query_param("resource", "https://eventhubs.azure.net"))
		.and(query_param("client_id", "client-1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"access_token": "eyJ0",
			"expires_on": expires_on.to_string(),
		})))
		.expect(1)
		.mount(&server)
		.await;

	let source = AzureImdsSource::new(transport())
		.with_endpoint(format!("{}/metadata/identity/oauth2/token", server.uri()))
		.with_client_id("client-1");
	let token = source
		.token(
			&Context::background(),
			&TokenOptions::with_scope("https://eventhubs.azure.net/.default"),
		)
		.await
		.unwrap();

	assert_eq!(token.as_str(), "eyJ0");
	assert_eq!(token.expires_at().unwrap().timestamp(), expires_on);
}

#[tokio::test]
async fn imds_requires_scope() {
	let source = AzureImdsSource::new(transport());
	let err = source
		.token(&Context::background(), &TokenOptions::default())
		.await
		.unwrap_err();
	assert!(matches!(err, AuthError::InvalidConfig(_)));
}

struct CountingSource {
	calls: AtomicU32,
}

#[async_trait]
impl TokenSource for CountingSource {
	async fn token(&self, _ctx: &Context, _opts: &TokenOptions) -> Result<Token, AuthError> {
		let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		tokio::time::sleep(Duration::from_millis(50)).await;
		Ok(Token::new(
			format!("T{n}"),
			Some(Utc::now() + chrono::Duration::hours(1)),
		))
	}
}

#[tokio::test]
async fn cache_coalesces_source_calls() {
	let cache = Arc::new(TokenCache::new());
	let source = Arc::new(CountingSource {
		calls: AtomicU32::new(0),
	});
	let key = InvolvedObject::post("Provider", "eventhub", "flux-system");

	let mut handles = Vec::new();
	for _ in 0..10 {
		let cache = Arc::clone(&cache);
		let source = Arc::clone(&source);
		let key = key.clone();
		handles.push(tokio::spawn(async move {
			let ctx = Context::background();
			cache
				.get_or_fetch(&ctx, &key, move |fetch_ctx| async move {
					source
						.token(&fetch_ctx, &TokenOptions::with_scope("scope"))
						.await
				})
				.await
		}));
	}

	for handle in handles {
		assert_eq!(handle.await.unwrap().unwrap().as_str(), "T1");
	}
	assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}
