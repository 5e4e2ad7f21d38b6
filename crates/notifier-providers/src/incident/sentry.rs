// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Sentry envelope ingestion.
//!
//! The address is a DSN (`https://<key>@<host>/<project>`). Error and trace
//! events become Sentry events; info events become transactions so that
//! successful reconciliations show up in performance views. Ids are derived
//! from the event content, so a redelivered event keeps its id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_common_http::{HttpError, OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString, Severity};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::instrument;
use url::Url;

use crate::error::NotifyError;
use crate::message::title;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const ENVELOPE_CONTENT_TYPE: &str = "application/x-sentry-envelope";

/// Parsed DSN.
#[derive(Debug, Clone)]
pub(crate) struct Dsn {
	raw: String,
	public_key: SecretString,
	envelope_url: String,
}

impl Dsn {
	pub(crate) fn parse(dsn: &str) -> Result<Self, NotifyError> {
		let url = Url::parse(dsn.trim())
			.map_err(|e| NotifyError::invalid_config(format!("invalid sentry DSN: {e}")))?;
		if url.username().is_empty() {
			return Err(NotifyError::invalid_config("sentry DSN is missing the public key"));
		}
		let host = url
			.host_str()
			.ok_or_else(|| NotifyError::invalid_config("sentry DSN is missing a host"))?;
		let path = url.path().trim_matches('/');
		let (prefix, project) = match path.rsplit_once('/') {
			Some((prefix, project)) => (format!("/{prefix}"), project),
			None => (String::new(), path),
		};
		if project.is_empty() {
			return Err(NotifyError::invalid_config("sentry DSN is missing the project id"));
		}
		let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
		Ok(Self {
			raw: dsn.trim().to_string(),
			public_key: SecretString::from(url.username()),
			envelope_url: format!("{}://{host}{port}{prefix}/api/{project}/envelope/", url.scheme()),
		})
	}

	fn auth_header(&self) -> String {
		format!(
			"Sentry sentry_version=7, sentry_client=notifier/{}, sentry_key={}",
			env!("CARGO_PKG_VERSION"),
			self.public_key.expose()
		)
	}
}

#[derive(Debug, Serialize)]
struct EnvelopeHeader<'a> {
	event_id: &'a str,
	sent_at: DateTime<Utc>,
	dsn: &'a str,
}

#[derive(Debug, Serialize)]
struct ItemHeader {
	#[serde(rename = "type")]
	item_type: &'static str,
	length: usize,
}

#[derive(Debug)]
pub struct Sentry {
	dsn: Dsn,
	environment: Option<String>,
	transport: Transport,
}

/// Stable hex digest of the event, used for every id in the envelope.
fn event_digest(event: &Event) -> Result<String, NotifyError> {
	let encoded = serde_json::to_vec(event).map_err(HttpError::from)?;
	Ok(hex::encode(Sha256::digest(encoded)))
}

fn level(severity: Severity) -> &'static str {
	match severity {
		Severity::Error => "error",
		Severity::Info => "info",
		Severity::Trace => "debug",
	}
}

impl Sentry {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		if opts.url.trim().is_empty() {
			return Err(NotifyError::invalid_config("sentry requires a DSN as address"));
		}
		Ok(Self {
			dsn: Dsn::parse(&opts.url)?,
			environment: (!opts.channel.is_empty()).then(|| opts.channel.clone()),
			transport: opts.transport()?,
		})
	}

	fn tags(event: &Event) -> BTreeMap<String, String> {
		let obj = &event.involved_object;
		let mut tags: BTreeMap<String, String> = event
			.annotations()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		tags.insert("flux_involved_object_kind".to_string(), obj.kind.clone());
		tags.insert("flux_involved_object_name".to_string(), obj.name.clone());
		tags.insert("flux_involved_object_namespace".to_string(), obj.namespace.clone());
		tags.insert("flux_reason".to_string(), event.reason.clone());
		tags
	}

	pub(crate) fn item(&self, event: &Event, digest: &str) -> (&'static str, serde_json::Value) {
		let event_id = &digest[..32];
		let mut item = json!({
			"event_id": event_id,
			"timestamp": event.timestamp,
			"platform": "other",
			"level": level(event.severity),
			"server_name": event.reporting_controller,
			"tags": Self::tags(event),
		});
		if let Some(env) = &self.environment {
			item["environment"] = json!(env);
		}

		if event.severity == Severity::Info {
			item["type"] = json!("transaction");
			item["transaction"] = json!(title(event));
			item["start_timestamp"] = json!(event.timestamp);
			item["contexts"] = json!({
				"trace": {
					"trace_id": &digest[..32],
					"span_id": &digest[32..48],
					"op": event.reason,
					"description": event.message,
					"status": "ok",
				}
			});
			("transaction", item)
		} else {
			item["message"] = json!({ "formatted": event.message });
			item["logger"] = json!(event.reporting_controller);
			item["transaction"] = json!(title(event));
			("event", item)
		}
	}

	/// Newline-delimited envelope: header, item header, item payload.
	pub(crate) fn envelope(&self, event: &Event, sent_at: DateTime<Utc>) -> Result<Vec<u8>, NotifyError> {
		let digest = event_digest(event)?;
		let (item_type, item) = self.item(event, &digest);
		let payload = serde_json::to_vec(&item).map_err(HttpError::from)?;
		let header = EnvelopeHeader {
			event_id: &digest[..32],
			sent_at,
			dsn: &self.dsn.raw,
		};

		let mut body = serde_json::to_vec(&header).map_err(HttpError::from)?;
		body.push(b'\n');
		let item_header = ItemHeader {
			item_type,
			length: payload.len(),
		};
		body.extend(serde_json::to_vec(&item_header).map_err(HttpError::from)?);
		body.push(b'\n');
		body.extend(payload);
		body.push(b'\n');
		Ok(body)
	}
}

#[async_trait]
impl Notifier for Sentry {
	#[instrument(skip_all, fields(provider = "sentry", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let body = self.envelope(event, event.timestamp)?;
		let req = OutboundRequest::post(&self.dsn.envelope_url)
			.header("X-Sentry-Auth", self.dsn.auth_header())
			.body(body, ENVELOPE_CONTENT_TYPE);
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
