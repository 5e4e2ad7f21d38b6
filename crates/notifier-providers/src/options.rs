// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provider configuration: the resolved instance and the options snapshot
//! handed to constructors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use notifier_auth::{InvolvedObject, TokenCache, TokenOptions, TokenSource};
use notifier_common_http::{ClientOptions, RetryConfig, TlsConfig, Transport};
use notifier_core::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::NotifyError;

/// Kind used for token cache keys.
pub const PROVIDER_KIND: &str = "Provider";

/// PEM material as it appears in provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
	pub ca_pem: Option<String>,
	pub cert_pem: Option<String>,
	pub key_pem: Option<SecretString>,
}

impl From<&TlsSettings> for TlsConfig {
	fn from(settings: &TlsSettings) -> Self {
		TlsConfig {
			ca_pem: settings.ca_pem.clone(),
			cert_pem: settings.cert_pem.clone(),
			key_pem: settings.key_pem.as_ref().map(|k| k.expose().clone()),
		}
	}
}

/// A provider object as resolved by the routing layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderInstance {
	#[serde(rename = "type")]
	pub provider_type: String,
	pub name: String,
	pub namespace: String,
	#[serde(alias = "url")]
	pub address: String,
	pub proxy: Option<String>,
	pub channel: String,
	pub username: String,
	pub token: SecretString,
	pub password: SecretString,
	pub headers: BTreeMap<String, String>,
	pub tls: Option<TlsSettings>,
	pub commit_status_id: String,
	pub service_account_name: Option<String>,
	pub secret_data: BTreeMap<String, SecretString>,
	pub timeout_secs: Option<u64>,
}

/// Immutable configuration snapshot a notifier is built from.
#[derive(Clone)]
pub struct NotifierOptions {
	pub url: String,
	pub proxy: Option<String>,
	pub tls: Option<TlsConfig>,
	pub token: SecretString,
	pub password: SecretString,
	pub username: String,
	pub channel: String,
	pub headers: BTreeMap<String, String>,
	pub commit_status_id: String,
	pub secret_data: BTreeMap<String, SecretString>,
	pub service_account_name: Option<String>,
	pub provider_name: String,
	pub provider_namespace: String,
	pub token_cache: Option<Arc<TokenCache>>,
	pub token_source: Option<Arc<dyn TokenSource>>,
	pub retry: RetryConfig,
	pub timeout: Duration,
}

impl fmt::Debug for NotifierOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NotifierOptions")
			.field("url", &self.url)
			.field("proxy", &self.proxy)
			.field("tls", &self.tls)
			.field("token", &self.token)
			.field("password", &self.password)
			.field("username", &self.username)
			.field("channel", &self.channel)
			.field("headers", &self.headers.keys().collect::<Vec<_>>())
			.field("commit_status_id", &self.commit_status_id)
			.field("secret_data", &self.secret_data.keys().collect::<Vec<_>>())
			.field("service_account_name", &self.service_account_name)
			.field("provider_name", &self.provider_name)
			.field("provider_namespace", &self.provider_namespace)
			.field("token_source", &self.token_source.is_some())
			.field("retry", &self.retry)
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl Default for NotifierOptions {
	fn default() -> Self {
		Self {
			url: String::new(),
			proxy: None,
			tls: None,
			token: SecretString::default(),
			password: SecretString::default(),
			username: String::new(),
			channel: String::new(),
			headers: BTreeMap::new(),
			commit_status_id: String::new(),
			secret_data: BTreeMap::new(),
			service_account_name: None,
			provider_name: String::new(),
			provider_namespace: String::new(),
			token_cache: None,
			token_source: None,
			retry: RetryConfig::default(),
			timeout: ClientOptions::default().timeout,
		}
	}
}

impl NotifierOptions {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			..Self::default()
		}
	}

	/// Snapshot of a resolved provider instance, using the process-wide
	/// token cache and retry/timeout settings from the environment.
	pub fn from_instance(instance: &ProviderInstance) -> Self {
		let client = ClientOptions::from_env();
		Self {
			url: instance.address.clone(),
			proxy: instance.proxy.clone().filter(|p| !p.is_empty()),
			tls: instance.tls.as_ref().map(TlsConfig::from),
			token: instance.token.clone(),
			password: instance.password.clone(),
			username: instance.username.clone(),
			channel: instance.channel.clone(),
			headers: instance.headers.clone(),
			commit_status_id: instance.commit_status_id.clone(),
			secret_data: instance.secret_data.clone(),
			service_account_name: instance.service_account_name.clone().filter(|s| !s.is_empty()),
			provider_name: instance.name.clone(),
			provider_namespace: instance.namespace.clone(),
			token_cache: Some(TokenCache::global()),
			token_source: None,
			retry: RetryConfig::from_env(),
			timeout: instance
				.timeout_secs
				.filter(|s| *s > 0)
				.map(Duration::from_secs)
				.unwrap_or(client.timeout),
		}
	}

	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = SecretString::new(token.into());
		self
	}

	pub fn with_password(mut self, password: impl Into<String>) -> Self {
		self.password = SecretString::new(password.into());
		self
	}

	pub fn with_username(mut self, username: impl Into<String>) -> Self {
		self.username = username.into();
		self
	}

	pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
		self.channel = channel.into();
		self
	}

	pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
		let proxy = proxy.into();
		self.proxy = if proxy.is_empty() { None } else { Some(proxy) };
		self
	}

	pub fn with_tls(mut self, tls: TlsConfig) -> Self {
		self.tls = Some(tls);
		self
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}

	pub fn with_commit_status_id(mut self, id: impl Into<String>) -> Self {
		self.commit_status_id = id.into();
		self
	}

	pub fn with_secret_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.secret_data.insert(key.into(), SecretString::new(value.into()));
		self
	}

	pub fn with_service_account(mut self, name: impl Into<String>) -> Self {
		self.service_account_name = Some(name.into());
		self
	}

	pub fn with_provider(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
		self.provider_name = name.into();
		self.provider_namespace = namespace.into();
		self
	}

	pub fn with_token_cache(mut self, cache: Arc<TokenCache>) -> Self {
		self.token_cache = Some(cache);
		self
	}

	pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
		self.token_source = Some(source);
		self
	}

	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// The explicit token, when one is set.
	pub fn token(&self) -> Option<&str> {
		self.token.non_empty()
	}

	pub fn password(&self) -> Option<&str> {
		self.password.non_empty()
	}

	pub fn secret(&self, key: &str) -> Option<&str> {
		self.secret_data.get(key).and_then(SecretString::non_empty)
	}

	/// Secret data as plain strings, for credential parsers.
	pub fn secret_map(&self) -> BTreeMap<String, String> {
		self
			.secret_data
			.iter()
			.map(|(k, v)| (k.clone(), v.expose().clone()))
			.collect()
	}

	/// The configured URL, which must be present and parse.
	pub fn parsed_url(&self) -> Result<Url, NotifyError> {
		if self.url.trim().is_empty() {
			return Err(NotifyError::invalid_config("address is required"));
		}
		Url::parse(self.url.trim())
			.map_err(|e| NotifyError::invalid_config(format!("invalid address '{}': {e}", self.url)))
	}

	pub fn client_options(&self) -> ClientOptions {
		ClientOptions {
			proxy: self.proxy.clone(),
			tls: self.tls.clone(),
			timeout: self.timeout,
		}
	}

	/// An HTTP transport bound to this provider's proxy, TLS and retry
	/// settings.
	pub fn transport(&self) -> Result<Transport, NotifyError> {
		Transport::new(&self.client_options(), self.retry.clone())
			.map_err(|e| NotifyError::invalid_config(e.to_string()))
	}

	pub fn token_cache(&self) -> Arc<TokenCache> {
		self.token_cache.clone().unwrap_or_else(TokenCache::global)
	}

	/// Token cache key for this provider object.
	pub fn cache_key(&self) -> InvolvedObject {
		InvolvedObject::post(PROVIDER_KIND, &self.provider_name, &self.provider_namespace)
	}

	pub fn token_options(&self, scope: &str) -> TokenOptions {
		TokenOptions {
			scopes: vec![scope.to_string()],
			proxy: self.proxy.clone(),
			service_account_name: self.service_account_name.clone(),
			service_account_namespace: self
				.service_account_name
				.as_ref()
				.map(|_| self.provider_namespace.clone()),
			provider_name: Some(self.provider_name.clone()),
			provider_namespace: Some(self.provider_namespace.clone()),
		}
	}

	/// Reject a literal token combined with a workload identity service
	/// account.
	pub fn ensure_token_xor_service_account(&self) -> Result<(), NotifyError> {
		if self.token().is_some() && self.service_account_name.is_some() {
			return Err(NotifyError::invalid_config(
				"token and service account name cannot be set at the same time",
			));
		}
		Ok(())
	}
}
