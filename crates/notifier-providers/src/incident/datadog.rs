// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Datadog events API.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString, Severity};
use serde::Serialize;
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::{plain_text, title};
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const DEFAULT_URL: &str = "https://api.datadoghq.com";

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct DatadogEvent {
	title: String,
	text: String,
	alert_type: &'static str,
	source_type_name: &'static str,
	aggregation_key: String,
	date_happened: i64,
	tags: Vec<String>,
}

#[derive(Debug)]
pub struct Datadog {
	url: String,
	api_key: SecretString,
	transport: Transport,
}

impl Datadog {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let api_key = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("datadog requires an API key as token"))?;
		let base = if opts.url.trim().is_empty() {
			DEFAULT_URL.to_string()
		} else {
			opts.parsed_url()?.origin().ascii_serialization()
		};
		Ok(Self {
			url: format!("{base}/api/v1/events"),
			api_key: SecretString::from(api_key),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(event: &Event) -> DatadogEvent {
		let obj = &event.involved_object;
		let mut tags = vec![
			format!("flux_reporting_controller:{}", event.reporting_controller),
			format!("flux_reason:{}", event.reason),
			format!("flux_{}_name:{}", obj.kind.to_lowercase(), obj.name),
			format!("flux_{}_namespace:{}", obj.kind.to_lowercase(), obj.namespace),
		];
		tags.extend(event.annotations().map(|(k, v)| format!("{k}:{v}")));

		DatadogEvent {
			title: title(event),
			text: plain_text(event),
			alert_type: match event.severity {
				Severity::Error => "error",
				Severity::Info | Severity::Trace => "info",
			},
			source_type_name: "fluxcd",
			aggregation_key: event.object_key(),
			date_happened: event.timestamp.timestamp(),
			tags,
		}
	}
}

#[async_trait]
impl Notifier for Datadog {
	#[instrument(skip_all, fields(provider = "datadog", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = OutboundRequest::post(&self.url)
			.header("DD-API-KEY", self.api_key.expose().as_str())
			.json(&Self::payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
