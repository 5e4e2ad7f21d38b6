// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Microsoft Teams: legacy Office 365 connector cards or Adaptive Cards for
//! workflow webhooks.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, Severity};
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::title;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const LEGACY_HOST_SUFFIX: &str = "webhook.office.com";

#[derive(Debug)]
pub struct MsTeams {
	url: String,
	legacy: bool,
	transport: Transport,
}

impl MsTeams {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		let legacy = url
			.host_str()
			.is_some_and(|h| h.ends_with(LEGACY_HOST_SUFFIX));
		Ok(Self {
			url: url.to_string(),
			legacy,
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(&self, event: &Event) -> Value {
		if self.legacy {
			message_card(event)
		} else {
			adaptive_card(event)
		}
	}
}

fn message_card(event: &Event) -> Value {
	let theme = match event.severity {
		Severity::Error => "FF0000",
		Severity::Info | Severity::Trace => "0076D7",
	};
	let facts: Vec<Value> = event
		.annotations()
		.map(|(k, v)| json!({"name": k, "value": v}))
		.collect();

	json!({
		"@type": "MessageCard",
		"@context": "https://schema.org/extensions",
		"themeColor": theme,
		"summary": title(event),
		"sections": [{
			"activityTitle": event.message,
			"activitySubtitle": title(event),
			"facts": facts,
		}],
	})
}

fn adaptive_card(event: &Event) -> Value {
	let color = match event.severity {
		Severity::Error => "attention",
		Severity::Info | Severity::Trace => "good",
	};
	let mut body = vec![
		json!({
			"type": "TextBlock",
			"text": title(event),
			"size": "medium",
			"weight": "bolder",
			"color": color,
			"wrap": true,
		}),
		json!({"type": "TextBlock", "text": event.message, "wrap": true}),
	];
	let facts: Vec<Value> = event
		.annotations()
		.map(|(k, v)| json!({"title": k, "value": v}))
		.collect();
	if !facts.is_empty() {
		body.push(json!({"type": "FactSet", "facts": facts}));
	}

	json!({
		"type": "message",
		"attachments": [{
			"contentType": "application/vnd.microsoft.card.adaptive",
			"content": {
				"$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
				"type": "AdaptiveCard",
				"version": "1.4",
				"body": body,
			},
		}],
	})
}

#[async_trait]
impl Notifier for MsTeams {
	#[instrument(skip_all, fields(provider = "msteams", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = OutboundRequest::post(&self.url).json(&self.payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
