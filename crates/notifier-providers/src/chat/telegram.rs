// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Telegram Bot API `sendMessage`.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::{escape_markdown_v2, metadata_lines, title};
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct SendMessage {
	chat_id: String,
	text: String,
	parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
	ok: bool,
	#[serde(default)]
	description: String,
}

#[derive(Debug)]
pub struct Telegram {
	api_url: String,
	chat_id: String,
	token: SecretString,
	transport: Transport,
}

impl Telegram {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let token = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("telegram requires a bot token"))?;
		if opts.channel.is_empty() {
			return Err(NotifyError::invalid_config("telegram requires a chat id as channel"));
		}
		let api_url = if opts.url.trim().is_empty() {
			DEFAULT_API_URL.to_string()
		} else {
			opts.parsed_url()?.as_str().trim_end_matches('/').to_string()
		};
		Ok(Self {
			api_url,
			chat_id: opts.channel.clone(),
			token: SecretString::from(token),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(&self, event: &Event) -> SendMessage {
		let mut text = format!(
			"*{}*\n{}",
			escape_markdown_v2(&title(event)),
			escape_markdown_v2(&event.message)
		);
		for line in metadata_lines(event) {
			text.push_str("\n\\- ");
			text.push_str(&escape_markdown_v2(&line));
		}
		SendMessage {
			chat_id: self.chat_id.clone(),
			text,
			parse_mode: "MarkdownV2",
		}
	}
}

#[async_trait]
impl Notifier for Telegram {
	#[instrument(skip_all, fields(provider = "telegram", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let url = format!("{}/bot{}/sendMessage", self.api_url, self.token.expose());
		let req = OutboundRequest::post(url).json(&self.payload(event))?;
		let resp: ApiResponse = self.transport.send(ctx, &req).await?.json()?;
		if !resp.ok {
			return Err(NotifyError::provider(format!(
				"telegram error: {}",
				resp.description
			)));
		}
		Ok(())
	}
}
