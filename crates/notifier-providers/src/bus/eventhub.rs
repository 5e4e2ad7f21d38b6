// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Azure Event Hubs over the REST send API.
//!
//! Authentication is one of:
//! - a shared access signature derived from a connection string address
//! - a literal bearer token
//! - a managed identity token, fetched through the token cache
//!
//! Each post builds its own sender and drops it after the send.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use notifier_auth::{AzureImdsSource, TokenSource};
use notifier_common_http::{HttpError, OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, instrument};

use crate::credentials::CachedToken;
use crate::error::NotifyError;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

pub const EVENTHUBS_SCOPE: &str = "https://eventhubs.azure.net/.default";
const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";
const API_VERSION: &str = "2014-01";
const SAS_LIFETIME_SECS: i64 = 3600;

/// Fields of an Event Hubs connection string that matter for sending.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionString {
	endpoint: String,
	key_name: String,
	key: SecretString,
	entity_path: Option<String>,
}

impl ConnectionString {
	pub(crate) fn is_connection_string(address: &str) -> bool {
		address.contains("SharedAccessKey=")
	}

	pub(crate) fn parse(raw: &str) -> Result<Self, NotifyError> {
		let mut fields = BTreeMap::new();
		for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
			let (k, v) = part
				.split_once('=')
				.ok_or_else(|| NotifyError::invalid_config("malformed event hub connection string"))?;
			fields.insert(k.to_ascii_lowercase(), v.to_string());
		}
		let field = |name: &str| {
			fields
				.get(name)
				.filter(|v| !v.is_empty())
				.cloned()
				.ok_or_else(|| NotifyError::invalid_config(format!("connection string is missing {name}")))
		};
		let endpoint = field("endpoint")?;
		let endpoint = match endpoint.strip_prefix("sb://") {
			Some(rest) => format!("https://{rest}"),
			None => endpoint,
		};
		Ok(Self {
			endpoint: endpoint.trim_end_matches('/').to_string(),
			key_name: field("sharedaccesskeyname")?,
			key: SecretString::from(field("sharedaccesskey")?.as_str()),
			entity_path: fields.get("entitypath").filter(|v| !v.is_empty()).cloned(),
		})
	}
}

/// `SharedAccessSignature sr=..&sig=..&se=..&skn=..` for `resource`.
pub(crate) fn sas_token(
	resource: &str,
	key_name: &str,
	key: &str,
	expiry: DateTime<Utc>,
) -> Result<String, NotifyError> {
	let encoded_resource = urlencoding::encode(&resource.to_lowercase()).into_owned();
	let expiry = expiry.timestamp();
	let to_sign = format!("{encoded_resource}\n{expiry}");

	let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
		.map_err(|e| NotifyError::invalid_config(format!("invalid shared access key: {e}")))?;
	mac.update(to_sign.as_bytes());
	let signature = STANDARD.encode(mac.finalize().into_bytes());

	Ok(format!(
		"SharedAccessSignature sr={encoded_resource}&sig={}&se={expiry}&skn={key_name}",
		urlencoding::encode(&signature)
	))
}

#[derive(Debug)]
enum Auth {
	Sas { key_name: String, key: SecretString },
	Bearer(SecretString),
	ManagedIdentity(CachedToken),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BatchMessage {
	body: String,
	user_properties: BTreeMap<String, String>,
}

/// One-shot sender for a single post.
struct Sender<'a> {
	hub: &'a EventHub,
	authorization: String,
}

impl Sender<'_> {
	async fn send(self, ctx: &Context, batch: &[BatchMessage]) -> Result<(), HttpError> {
		let req = OutboundRequest::post(&self.hub.messages_url)
			.header("Authorization", self.authorization)
			.body(serde_json::to_vec(batch)?, BATCH_CONTENT_TYPE);
		self.hub.transport.send(ctx, &req).await?;
		Ok(())
	}
}

#[derive(Debug)]
pub struct EventHub {
	resource: String,
	messages_url: String,
	auth: Auth,
	transport: Transport,
}

impl EventHub {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let address = opts.url.trim();
		if address.is_empty() {
			return Err(NotifyError::invalid_config("azureeventhub requires an address"));
		}

		let (base, hub, auth) = if ConnectionString::is_connection_string(address) {
			if opts.token().is_some() {
				return Err(NotifyError::invalid_config(
					"SAS authentication cannot be set at the same time as a JWT token",
				));
			}
			let conn = ConnectionString::parse(address)?;
			let hub = conn.entity_path.clone().unwrap_or_else(|| opts.channel.clone());
			let auth = Auth::Sas {
				key_name: conn.key_name,
				key: conn.key,
			};
			(conn.endpoint, hub, auth)
		} else {
			let base = if address.contains("://") {
				opts.parsed_url()?.as_str().trim_end_matches('/').to_string()
			} else if address.contains('.') {
				format!("https://{address}")
			} else {
				format!("https://{address}.servicebus.windows.net")
			};
			let auth = match opts.token() {
				Some(token) => Auth::Bearer(SecretString::from(token)),
				None => Auth::ManagedIdentity(CachedToken::new(opts, EVENTHUBS_SCOPE, || {
					let source: Arc<dyn TokenSource> = Arc::new(AzureImdsSource::from_env()?);
					Ok(source)
				})?),
			};
			(base, opts.channel.clone(), auth)
		};

		if hub.is_empty() {
			return Err(NotifyError::invalid_config(
				"azureeventhub requires an event hub name as channel or EntityPath",
			));
		}
		let resource = format!("{base}/{hub}");
		Ok(Self {
			messages_url: format!("{resource}/messages?api-version={API_VERSION}&timeout=60"),
			resource,
			auth,
			transport: opts.transport()?,
		})
	}

	pub(crate) fn batch(event: &Event) -> Result<Vec<BatchMessage>, NotifyError> {
		let body = serde_json::to_string(event).map_err(HttpError::from)?;
		let user_properties = event
			.annotations()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		Ok(vec![BatchMessage {
			body,
			user_properties,
		}])
	}

	async fn sender(&self, ctx: &Context) -> Result<Sender<'_>, NotifyError> {
		let authorization = match &self.auth {
			Auth::Sas { key_name, key } => sas_token(
				&self.resource,
				key_name,
				key.expose(),
				Utc::now() + Duration::seconds(SAS_LIFETIME_SECS),
			)?,
			Auth::Bearer(token) => format!("Bearer {}", token.expose()),
			Auth::ManagedIdentity(cached) => format!("Bearer {}", cached.get(ctx).await?.as_str()),
		};
		Ok(Sender {
			hub: self,
			authorization,
		})
	}
}

#[async_trait]
impl Notifier for EventHub {
	#[instrument(skip_all, fields(provider = "azureeventhub", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let batch = Self::batch(event)?;
		let sender = self.sender(ctx).await?;
		let result = sender.send(ctx, &batch).await;
		if let (Err(e), Auth::ManagedIdentity(cached)) = (&result, &self.auth) {
			if e.status_code() == Some(401) {
				debug!("event hub rejected the managed identity token");
				cached.invalidate();
			}
		}
		result?;
		Ok(())
	}
}
