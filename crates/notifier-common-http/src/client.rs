// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client construction bound to a proxy and TLS configuration.

use std::env;
use std::time::Duration;

use reqwest::{Certificate, Client, ClientBuilder, Identity, Proxy};
use tracing::{debug, warn};

use crate::error::HttpError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const ENV_TIMEOUT_SECS: &str = "NOTIFIER_HTTP_TIMEOUT_SECS";

/// TLS material for a provider endpoint.
///
/// PEM encoded. `ca_pem` may hold several certificates which are all added
/// to the trust store on top of the bundled web roots. A client certificate
/// is used only when both `cert_pem` and `key_pem` are present.
#[derive(Clone, Default)]
pub struct TlsConfig {
	pub ca_pem: Option<String>,
	pub cert_pem: Option<String>,
	pub key_pem: Option<String>,
}

impl std::fmt::Debug for TlsConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TlsConfig")
			.field("ca_pem", &self.ca_pem.as_ref().map(|_| "<pem>"))
			.field("cert_pem", &self.cert_pem.as_ref().map(|_| "<pem>"))
			.field("key_pem", &self.key_pem.as_ref().map(|_| notifier_core::REDACTED))
			.finish()
	}
}

/// Per-provider client settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
	pub proxy: Option<String>,
	pub tls: Option<TlsConfig>,
	/// Per-attempt timeout.
	pub timeout: Duration,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			proxy: None,
			tls: None,
			timeout: DEFAULT_TIMEOUT,
		}
	}
}

impl ClientOptions {
	/// Defaults, with the per-attempt timeout taken from
	/// `NOTIFIER_HTTP_TIMEOUT_SECS` when set.
	pub fn from_env() -> Self {
		let mut opts = Self::default();
		if let Ok(raw) = env::var(ENV_TIMEOUT_SECS) {
			match raw.parse::<u64>() {
				Ok(secs) if secs > 0 => opts.timeout = Duration::from_secs(secs),
				_ => warn!(value = %raw, "ignoring invalid {ENV_TIMEOUT_SECS}"),
			}
		}
		opts
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

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}
}

/// Returns the User-Agent sent on every outbound request.
///
/// Format: `notifier/{version}`
pub fn user_agent() -> String {
	format!("notifier/{}", env!("CARGO_PKG_VERSION"))
}

/// Creates a client builder with the standard User-Agent and rustls.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent()).use_rustls_tls()
}

/// Builds a client bound to the proxy and TLS material in `opts`.
pub fn build_client(opts: &ClientOptions) -> Result<Client, HttpError> {
	let mut builder = builder().timeout(opts.timeout);

	if let Some(proxy) = opts.proxy.as_deref().filter(|p| !p.is_empty()) {
		let proxy = Proxy::all(proxy)
			.map_err(|e| HttpError::Config(format!("invalid proxy URL '{proxy}': {e}")))?;
		builder = builder.proxy(proxy);
		debug!("HTTP client configured with proxy");
	}

	if let Some(tls) = &opts.tls {
		if let Some(ca) = tls.ca_pem.as_deref().filter(|p| !p.trim().is_empty()) {
			let certs = Certificate::from_pem_bundle(ca.as_bytes())
				.map_err(|e| HttpError::Config(format!("invalid CA certificate: {e}")))?;
			if certs.is_empty() {
				return Err(HttpError::Config(
					"CA bundle contains no certificates".to_string(),
				));
			}
			for cert in certs {
				builder = builder.add_root_certificate(cert);
			}
		}

		match (tls.cert_pem.as_deref(), tls.key_pem.as_deref()) {
			(Some(cert), Some(key)) => {
				let pem = format!("{}\n{}", cert.trim_end(), key.trim_end());
				let identity = Identity::from_pem(pem.as_bytes())
					.map_err(|e| HttpError::Config(format!("invalid client certificate: {e}")))?;
				builder = builder.identity(identity);
			}
			(Some(_), None) | (None, Some(_)) => {
				return Err(HttpError::Config(
					"client certificate and key must be provided together".to_string(),
				));
			}
			(None, None) => {}
		}
	}

	builder
		.build()
		.map_err(|e| HttpError::Config(format!("failed to build HTTP client: {e}")))
}
