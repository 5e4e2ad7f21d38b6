// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Slack and the Slack-compatible webhooks of Discord and Rocket.Chat.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::{severity_color_name, title};
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const ICON_URL: &str = "https://avatars.githubusercontent.com/u/52158677";
const API_HOST: &str = "slack.com";
const API_POST_MESSAGE: &str = "/api/chat.postMessage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
	Slack,
	Discord,
	Rocket,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Payload {
	#[serde(skip_serializing_if = "String::is_empty")]
	channel: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	username: String,
	icon_url: &'static str,
	attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Attachment {
	color: &'static str,
	author_name: String,
	text: String,
	mrkdwn_in: [&'static str; 1],
	#[serde(skip_serializing_if = "Vec::is_empty")]
	fields: Vec<Field>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Field {
	title: String,
	value: String,
	short: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
	ok: bool,
	#[serde(default)]
	error: String,
}

#[derive(Debug)]
pub struct Slack {
	url: String,
	flavor: Flavor,
	channel: String,
	username: String,
	token: Option<SecretString>,
	api_mode: bool,
	transport: Transport,
}

impl Slack {
	pub fn new(opts: &NotifierOptions, flavor: Flavor) -> Result<Self, NotifyError> {
		let mut url = opts.parsed_url()?;
		let api_mode = flavor == Flavor::Slack
			&& url.host_str() == Some(API_HOST)
			&& url.path() == API_POST_MESSAGE;

		if api_mode {
			if opts.token().is_none() {
				return Err(NotifyError::invalid_config(
					"a token is required for the Slack chat.postMessage API",
				));
			}
			if opts.channel.is_empty() {
				return Err(NotifyError::invalid_config(
					"a channel is required for the Slack chat.postMessage API",
				));
			}
		}

		if flavor == Flavor::Discord && !url.path().ends_with("/slack") {
			let path = format!("{}/slack", url.path().trim_end_matches('/'));
			url.set_path(&path);
		}

		Ok(Self {
			url: url.to_string(),
			flavor,
			channel: opts.channel.clone(),
			username: opts.username.clone(),
			token: opts.token().map(SecretString::from),
			api_mode,
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(&self, event: &Event) -> Payload {
		let fields = event
			.annotations()
			.map(|(k, v)| Field {
				title: k.to_string(),
				value: v.to_string(),
				short: false,
			})
			.collect();

		Payload {
			channel: self.channel.clone(),
			username: self.username.clone(),
			icon_url: ICON_URL,
			attachments: vec![Attachment {
				color: severity_color_name(event.severity),
				author_name: title(event),
				text: event.message.clone(),
				mrkdwn_in: ["text"],
				fields,
			}],
		}
	}
}

#[async_trait]
impl Notifier for Slack {
	#[instrument(skip_all, fields(provider = ?self.flavor, object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}

		let mut req = OutboundRequest::post(&self.url).json(&self.payload(event))?;
		if let Some(token) = &self.token {
			req = req.bearer_auth(token.expose());
		}

		let resp = self.transport.send(ctx, &req).await?;

		if self.api_mode {
			let api: ApiResponse = resp.json()?;
			if !api.ok {
				return Err(NotifyError::provider(format!("Slack API error: {}", api.error)));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;
	use notifier_core::Severity;

	#[test]
	fn payload_shape() {
		let slack = Slack::new(
			&NotifierOptions::new("https://hooks.slack.com/services/x")
				.with_channel("general")
				.with_username("flux"),
			Flavor::Slack,
		)
		.unwrap();
		let json = serde_json::to_value(slack.payload(&event())).unwrap();

		assert_eq!(json["channel"], "general");
		assert_eq!(json["username"], "flux");
		assert_eq!(json["attachments"][0]["color"], "good");
		assert_eq!(json["attachments"][0]["author_name"], "kustomization/apps.flux-system");
		assert_eq!(json["attachments"][0]["fields"][0]["title"], "cluster");
	}

	#[test]
	fn error_is_danger() {
		let slack = Slack::new(&NotifierOptions::new("https://hooks.slack.com/x"), Flavor::Slack).unwrap();
		let mut e = event();
		e.severity = Severity::Error;
		assert_eq!(slack.payload(&e).attachments[0].color, "danger");
	}

	#[test]
	fn discord_appends_slack_suffix() {
		let discord = Slack::new(
			&NotifierOptions::new("https://discord.com/api/webhooks/1/abc"),
			Flavor::Discord,
		)
		.unwrap();
		assert_eq!(discord.url, "https://discord.com/api/webhooks/1/abc/slack");

		let already = Slack::new(
			&NotifierOptions::new("https://discord.com/api/webhooks/1/abc/slack"),
			Flavor::Discord,
		)
		.unwrap();
		assert_eq!(already.url, "https://discord.com/api/webhooks/1/abc/slack");
	}

	#[test]
	fn api_mode_requires_token_and_channel() {
		let url = "https://slack.com/api/chat.postMessage";
		assert!(Slack::new(&NotifierOptions::new(url).with_channel("c"), Flavor::Slack).is_err());
		assert!(Slack::new(&NotifierOptions::new(url).with_token("t"), Flavor::Slack).is_err());
		let slack = Slack::new(
			&NotifierOptions::new(url).with_token("t").with_channel("c"),
			Flavor::Slack,
		)
		.unwrap();
		assert!(slack.api_mode);
	}
}
