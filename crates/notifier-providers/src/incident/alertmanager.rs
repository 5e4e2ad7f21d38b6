// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Prometheus Alertmanager `POST /api/v2/alerts`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString, META_SUMMARY};
use serde::Serialize;
use tracing::instrument;

use crate::error::NotifyError;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Alert {
	status: &'static str,
	labels: BTreeMap<String, String>,
	annotations: BTreeMap<String, String>,
	starts_at: DateTime<Utc>,
}

/// Alertmanager label names must match `[a-zA-Z_][a-zA-Z0-9_]*`.
fn label_name(key: &str) -> String {
	let mut name: String = key
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect();
	if name.starts_with(|c: char| c.is_ascii_digit()) {
		name.insert(0, '_');
	}
	name
}

fn title_case(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

#[derive(Debug)]
pub struct Alertmanager {
	url: String,
	token: Option<SecretString>,
	basic: Option<(String, SecretString)>,
	transport: Transport,
}

impl Alertmanager {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		let basic = match (opts.username.is_empty(), opts.password()) {
			(false, Some(password)) => Some((opts.username.clone(), SecretString::from(password))),
			_ => None,
		};
		Ok(Self {
			url: url.to_string(),
			token: opts.token().map(SecretString::from),
			basic,
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(event: &Event) -> Vec<Alert> {
		let obj = &event.involved_object;
		let mut labels: BTreeMap<String, String> = event
			.annotations()
			.filter(|(k, _)| *k != META_SUMMARY)
			.map(|(k, v)| (label_name(k), v.to_string()))
			.collect();
		labels.insert(
			"alertname".to_string(),
			format!("Flux{}{}", obj.kind, title_case(&event.reason)),
		);
		labels.insert("severity".to_string(), event.severity.to_string());
		labels.insert("reason".to_string(), event.reason.clone());
		labels.insert("kind".to_string(), obj.kind.clone());
		labels.insert("name".to_string(), obj.name.clone());
		labels.insert("namespace".to_string(), obj.namespace.clone());

		let mut annotations = BTreeMap::from([("message".to_string(), event.message.clone())]);
		if let Some(summary) = event.summary() {
			annotations.insert("summary".to_string(), summary.to_string());
		}

		vec![Alert {
			status: "firing",
			labels,
			annotations,
			starts_at: event.timestamp,
		}]
	}
}

#[async_trait]
impl Notifier for Alertmanager {
	#[instrument(skip_all, fields(provider = "alertmanager", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let mut req = OutboundRequest::post(&self.url).json(&Self::payload(event))?;
		if let Some((user, password)) = &self.basic {
			req = req.basic_auth(user, password.expose());
		} else if let Some(token) = &self.token {
			req = req.bearer_auth(token.expose());
		}
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
