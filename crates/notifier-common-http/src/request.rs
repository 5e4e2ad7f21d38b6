// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Outbound request description and the retrying transport that sends it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use notifier_core::{Context, Secret};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::client::{build_client, ClientOptions};
use crate::error::HttpError;
use crate::retry::{retry, RetryConfig};
use crate::signature::{signature_header_value, SIGNATURE_HEADER};

/// Callback applied to every attempt's request builder just before sending.
pub type RequestMutator = Arc<dyn Fn(RequestBuilder) -> RequestBuilder + Send + Sync>;

/// A fully described outbound request.
///
/// The body is encoded once; every retry attempt sends the same bytes and,
/// when a signing key is set, the same `X-Signature` header computed over
/// exactly those bytes.
#[derive(Clone)]
pub struct OutboundRequest {
	method: Method,
	url: String,
	headers: Vec<(String, String)>,
	body: Option<Bytes>,
	content_type: Option<String>,
	signing_key: Option<Secret<Vec<u8>>>,
	mutators: Vec<RequestMutator>,
}

impl fmt::Debug for OutboundRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OutboundRequest")
			.field("method", &self.method)
			.field("host", &redacted_host(&self.url))
			.field("headers", &self.headers.iter().map(|(k, _)| k).collect::<Vec<_>>())
			.field("body_len", &self.body.as_ref().map(Bytes::len))
			.field("signed", &self.signing_key.is_some())
			.finish_non_exhaustive()
	}
}

impl OutboundRequest {
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			headers: Vec::new(),
			body: None,
			content_type: None,
			signing_key: None,
			mutators: Vec::new(),
		}
	}

	pub fn get(url: impl Into<String>) -> Self {
		Self::new(Method::GET, url)
	}

	pub fn post(url: impl Into<String>) -> Self {
		Self::new(Method::POST, url)
	}

	pub fn put(url: impl Into<String>) -> Self {
		Self::new(Method::PUT, url)
	}

	/// Encode `body` as JSON.
	pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
		self.body = Some(Bytes::from(serde_json::to_vec(body)?));
		self.content_type = Some("application/json".to_string());
		Ok(self)
	}

	/// Use an already-encoded payload.
	pub fn body(mut self, body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
		self.body = Some(body.into());
		self.content_type = Some(content_type.into());
		self
	}

	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn headers<I, K, V>(mut self, headers: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self
			.headers
			.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
		self
	}

	pub fn bearer_auth(self, token: &str) -> Self {
		self.header("Authorization", format!("Bearer {token}"))
	}

	pub fn basic_auth(self, username: &str, password: &str) -> Self {
		let username = username.to_string();
		let password = password.to_string();
		self.mutate(move |b| b.basic_auth(&username, Some(&password)))
	}

	/// Sign the final body with HMAC-SHA256 under `key`.
	pub fn sign_with(mut self, key: &[u8]) -> Self {
		self.signing_key = Some(Secret::new(key.to_vec()));
		self
	}

	pub fn mutate<F>(mut self, f: F) -> Self
	where
		F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync + 'static,
	{
		self.mutators.push(Arc::new(f));
		self
	}

	pub fn method(&self) -> &Method {
		&self.method
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn body_bytes(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}
}

/// Scheme and authority only; paths and queries may carry credentials.
fn redacted_host(url: &str) -> String {
	match reqwest::Url::parse(url) {
		Ok(u) => format!("{}://{}", u.scheme(), u.host_str().unwrap_or_default()),
		Err(_) => "<invalid url>".to_string(),
	}
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
	pub status: StatusCode,
	pub body: Bytes,
}

impl HttpResponse {
	pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
		Ok(serde_json::from_slice(&self.body)?)
	}

	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// An HTTP client bound to one provider's proxy/TLS settings plus the retry
/// policy applied to every request it sends.
#[derive(Clone)]
pub struct Transport {
	client: Client,
	retry: RetryConfig,
}

impl fmt::Debug for Transport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Transport")
			.field("retry", &self.retry)
			.finish_non_exhaustive()
	}
}

impl Transport {
	pub fn new(opts: &ClientOptions, retry: RetryConfig) -> Result<Self, HttpError> {
		Ok(Self {
			client: build_client(opts)?,
			retry,
		})
	}

	pub fn from_client(client: Client, retry: RetryConfig) -> Self {
		Self { client, retry }
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn retry_config(&self) -> &RetryConfig {
		&self.retry
	}

	/// Send `req`, retrying transient failures.
	///
	/// 2xx is success. 429, 5xx and connection errors are retried with
	/// backoff; any other status fails immediately. Cancellation of `ctx`
	/// aborts the in-flight attempt or backoff sleep.
	pub async fn send(&self, ctx: &Context, req: &OutboundRequest) -> Result<HttpResponse, HttpError> {
		retry(ctx, &self.retry, || self.attempt(ctx, req)).await
	}

	/// Send `req` and decode the JSON response.
	pub async fn send_json<T: DeserializeOwned>(
		&self,
		ctx: &Context,
		req: &OutboundRequest,
	) -> Result<T, HttpError> {
		self.send(ctx, req).await?.json()
	}

	#[instrument(skip_all, fields(method = %req.method, host = %redacted_host(&req.url)))]
	async fn attempt(&self, ctx: &Context, req: &OutboundRequest) -> Result<HttpResponse, HttpError> {
		let mut builder = self.client.request(req.method.clone(), req.url.as_str());

		for (name, value) in &req.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		if let Some(body) = &req.body {
			if let Some(content_type) = &req.content_type {
				builder = builder.header(CONTENT_TYPE, content_type.as_str());
			}
			if let Some(key) = &req.signing_key {
				builder = builder.header(SIGNATURE_HEADER, signature_header_value(key.expose(), body)?);
			}
			builder = builder.body(body.clone());
		}

		for mutate in &req.mutators {
			builder = mutate(builder);
		}

		let response = ctx.run(builder.send()).await??;
		let status = response.status();
		let body = ctx.run(response.bytes()).await??;

		debug!(status = status.as_u16(), body_len = body.len(), "received response");

		if status.is_success() {
			Ok(HttpResponse { status, body })
		} else {
			Err(HttpError::status(status.as_u16(), &body))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn host_hides_path_and_query() {
		assert_eq!(
			redacted_host("https://api.telegram.org/bot123:secret/sendMessage?x=1"),
			"https://api.telegram.org"
		);
		assert_eq!(redacted_host("::"), "<invalid url>");
	}

	#[test]
	fn debug_omits_credentials() {
		let req = OutboundRequest::post("https://example.com/hook/s3cr3t")
			.bearer_auth("tok")
			.sign_with(b"key");
		let debug = format!("{req:?}");
		assert!(!debug.contains("s3cr3t"));
		assert!(!debug.contains("tok"));
		assert!(debug.contains("signed: true"));
	}

	#[test]
	fn json_sets_body_once() {
		let req = OutboundRequest::post("https://example.com")
			.json(&serde_json::json!({"a": 1}))
			.unwrap();
		assert_eq!(req.body_bytes(), Some(&b"{\"a\":1}"[..]));
		assert_eq!(req.method(), &Method::POST);
	}
}
