// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Webex messages API.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::Serialize;
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::markdown;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Payload {
	room_id: String,
	markdown: String,
}

#[derive(Debug)]
pub struct Webex {
	url: String,
	room_id: String,
	token: SecretString,
	transport: Transport,
}

impl Webex {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		let token = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("webex requires a bot token"))?;
		if opts.channel.is_empty() {
			return Err(NotifyError::invalid_config("webex requires a room id as channel"));
		}
		Ok(Self {
			url: url.to_string(),
			room_id: opts.channel.clone(),
			token: SecretString::from(token),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(&self, event: &Event) -> Payload {
		Payload {
			room_id: self.room_id.clone(),
			markdown: markdown(event),
		}
	}
}

#[async_trait]
impl Notifier for Webex {
	#[instrument(skip_all, fields(provider = "webex", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = OutboundRequest::post(&self.url)
			.bearer_auth(self.token.expose())
			.json(&self.payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
