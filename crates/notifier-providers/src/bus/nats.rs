// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! NATS core publishing over the text protocol.
//!
//! Each post opens a connection, reads the server `INFO`, sends `CONNECT`,
//! publishes the event JSON to the channel subject and waits for the `PONG`
//! that follows a `PING`, which confirms the server processed the publish.

use async_trait::async_trait;
use notifier_common_http::{retry, HttpError, RetryConfig, RetryableError};
use notifier_core::{Cancelled, Context, Event, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, instrument};
use url::Url;

use crate::error::NotifyError;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const DEFAULT_PORT: u16 = 4222;
/// Longest server line we accept; INFO lines are well under this.
const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub(crate) enum NatsError {
	#[error("nats connection failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("nats protocol error: {0}")]
	Protocol(String),

	#[error("nats server error: {0}")]
	Server(String),

	#[error(transparent)]
	Cancelled(#[from] Cancelled),
}

impl RetryableError for NatsError {
	fn is_retryable(&self) -> bool {
		matches!(self, NatsError::Io(_))
	}
}

impl From<NatsError> for NotifyError {
	fn from(err: NatsError) -> Self {
		match err {
			NatsError::Cancelled(c) => NotifyError::Transport(HttpError::Cancelled(c)),
			other => NotifyError::provider(other.to_string()),
		}
	}
}

#[derive(Debug, Deserialize, Default)]
struct ServerInfo {
	#[serde(default)]
	max_payload: Option<usize>,
	#[serde(default)]
	tls_required: bool,
}

#[derive(Debug, Serialize)]
struct ConnectOptions<'a> {
	verbose: bool,
	pedantic: bool,
	lang: &'static str,
	version: &'static str,
	name: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	user: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pass: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	auth_token: Option<&'a str>,
}

#[derive(Debug)]
pub struct Nats {
	host: String,
	port: u16,
	subject: String,
	username: Option<String>,
	password: Option<SecretString>,
	token: Option<SecretString>,
	retry: RetryConfig,
}

impl Nats {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		if url.scheme() != "nats" {
			return Err(NotifyError::invalid_config(format!(
				"nats address must use the nats:// scheme, got '{}'",
				url.scheme()
			)));
		}
		let host = url
			.host_str()
			.ok_or_else(|| NotifyError::invalid_config("nats address is missing a host"))?
			.to_string();
		if opts.channel.is_empty() || opts.channel.contains(char::is_whitespace) {
			return Err(NotifyError::invalid_config("nats requires a subject without whitespace as channel"));
		}
		let (username, password) = credentials(&url, opts);
		Ok(Self {
			host,
			port: url.port().unwrap_or(DEFAULT_PORT),
			subject: opts.channel.clone(),
			username,
			password,
			token: opts.token().map(SecretString::from),
			retry: opts.retry.clone(),
		})
	}

	fn connect_options(&self) -> ConnectOptions<'_> {
		ConnectOptions {
			verbose: false,
			pedantic: false,
			lang: "rust",
			version: env!("CARGO_PKG_VERSION"),
			name: "notifier",
			user: self.username.as_deref(),
			pass: self.password.as_ref().map(|p| p.expose().as_str()),
			auth_token: self.token.as_ref().map(|t| t.expose().as_str()),
		}
	}

	async fn publish_once(&self, ctx: &Context, payload: &[u8]) -> Result<(), NatsError> {
		let stream = ctx
			.run(TcpStream::connect((self.host.as_str(), self.port)))
			.await??;
		ctx.run(self.publish_on(stream, payload)).await?
	}

	pub(crate) async fn publish_on<S>(&self, stream: S, payload: &[u8]) -> Result<(), NatsError>
	where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		let mut conn = BufReader::new(stream);

		let info_line = read_line(&mut conn).await?;
		let info: ServerInfo = match info_line.strip_prefix("INFO ") {
			Some(json) => serde_json::from_str(json)
				.map_err(|e| NatsError::Protocol(format!("invalid INFO: {e}")))?,
			None => return Err(NatsError::Protocol(format!("expected INFO, got '{info_line}'"))),
		};
		if info.tls_required {
			return Err(NatsError::Protocol("server requires TLS".to_string()));
		}
		if let Some(max) = info.max_payload {
			if payload.len() > max {
				return Err(NatsError::Protocol(format!(
					"payload of {} bytes exceeds server max_payload {max}",
					payload.len()
				)));
			}
		}

		let connect = serde_json::to_string(&self.connect_options())
			.map_err(|e| NatsError::Protocol(e.to_string()))?;
		let mut frame = format!("CONNECT {connect}\r\nPUB {} {}\r\n", self.subject, payload.len()).into_bytes();
		frame.extend_from_slice(payload);
		frame.extend_from_slice(b"\r\nPING\r\n");
		conn.get_mut().write_all(&frame).await?;
		conn.get_mut().flush().await?;

		loop {
			let line = read_line(&mut conn).await?;
			match line.as_str() {
				"PONG" => {
					debug!(subject = %self.subject, "published to nats");
					return Ok(());
				}
				"PING" => conn.get_mut().write_all(b"PONG\r\n").await?,
				"+OK" => {}
				l if l.starts_with("-ERR") => {
					return Err(NatsError::Server(l.trim_start_matches("-ERR").trim().trim_matches('\'').to_string()))
				}
				l if l.starts_with("INFO ") => {}
				other => return Err(NatsError::Protocol(format!("unexpected '{other}'"))),
			}
		}
	}
}

/// User and password from the provider options, falling back to URL
/// userinfo.
fn credentials(url: &Url, opts: &NotifierOptions) -> (Option<String>, Option<SecretString>) {
	let username = if !opts.username.is_empty() {
		Some(opts.username.clone())
	} else if !url.username().is_empty() {
		Some(url.username().to_string())
	} else {
		None
	};
	let password = opts
		.password()
		.or(url.password())
		.map(SecretString::from);
	(username, password)
}

async fn read_line<R>(reader: &mut BufReader<R>) -> Result<String, NatsError>
where
	R: AsyncRead + Unpin,
{
	let mut line = String::new();
	let n = reader.read_line(&mut line).await?;
	if n == 0 {
		return Err(NatsError::Io(std::io::ErrorKind::UnexpectedEof.into()));
	}
	if line.len() > MAX_LINE_BYTES {
		return Err(NatsError::Protocol("server line too long".to_string()));
	}
	Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[async_trait]
impl Notifier for Nats {
	#[instrument(skip_all, fields(provider = "nats", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let payload = serde_json::to_vec(event).map_err(HttpError::from)?;
		retry(ctx, &self.retry, || self.publish_once(ctx, &payload)).await?;
		Ok(())
	}
}
