// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Lark (Feishu) custom bot interactive cards.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, Severity};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::{plain_text, title};
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug, Deserialize)]
struct BotResponse {
	#[serde(default)]
	code: i64,
	#[serde(default)]
	msg: String,
}

#[derive(Debug)]
pub struct Lark {
	url: String,
	transport: Transport,
}

impl Lark {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		Ok(Self {
			url: opts.parsed_url()?.to_string(),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(event: &Event) -> Value {
		let (emoji, template) = match event.severity {
			Severity::Error => ("💣", "red"),
			Severity::Info | Severity::Trace => ("💫", "turquoise"),
		};

		json!({
			"msg_type": "interactive",
			"card": {
				"config": {"wide_screen_mode": true},
				"header": {
					"title": {"tag": "plain_text", "content": format!("{emoji} {}", title(event))},
					"template": template,
				},
				"elements": [{
					"tag": "div",
					"text": {"tag": "lark_md", "content": plain_text(event)},
				}],
			},
		})
	}
}

#[async_trait]
impl Notifier for Lark {
	#[instrument(skip_all, fields(provider = "lark", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = OutboundRequest::post(&self.url).json(&Self::payload(event))?;
		let resp = self.transport.send(ctx, &req).await?;

		// The bot API answers 200 with a non-zero code on failure.
		if let Ok(body) = resp.json::<BotResponse>() {
			if body.code != 0 {
				return Err(NotifyError::provider(format!(
					"lark error {}: {}",
					body.code, body.msg
				)));
			}
		}
		Ok(())
	}
}
