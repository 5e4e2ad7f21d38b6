// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Matrix client-server API room messages.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::{plain_text, title};
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct RoomMessage {
	msgtype: &'static str,
	body: String,
}

#[derive(Debug)]
pub struct Matrix {
	homeserver: String,
	room_id: String,
	token: SecretString,
	transport: Transport,
}

impl Matrix {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		let token = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("matrix requires an access token"))?;
		if opts.channel.is_empty() {
			return Err(NotifyError::invalid_config("matrix requires a room id as channel"));
		}
		Ok(Self {
			homeserver: url.as_str().trim_end_matches('/').to_string(),
			room_id: opts.channel.clone(),
			token: SecretString::from(token),
			transport: opts.transport()?,
		})
	}

	/// Transaction id derived from the event so retries are idempotent.
	pub(crate) fn txn_id(event: &Event) -> Result<String, NotifyError> {
		let encoded = serde_json::to_vec(event).map_err(notifier_common_http::HttpError::from)?;
		Ok(hex::encode(Sha256::digest(encoded)))
	}

	pub(crate) fn message_url(&self, txn_id: &str) -> String {
		format!(
			"{}/_matrix/client/r0/rooms/{}/send/m.room.message/{txn_id}",
			self.homeserver,
			urlencoding::encode(&self.room_id)
		)
	}

	pub(crate) fn payload(event: &Event) -> RoomMessage {
		RoomMessage {
			msgtype: "m.text",
			body: format!("{} {}\n{}", event.severity, title(event), plain_text(event)),
		}
	}
}

#[async_trait]
impl Notifier for Matrix {
	#[instrument(skip_all, fields(provider = "matrix", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let txn_id = Self::txn_id(event)?;
		let req = OutboundRequest::put(self.message_url(&txn_id))
			.bearer_auth(self.token.expose())
			.json(&Self::payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
