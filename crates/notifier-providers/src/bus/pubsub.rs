// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Google Cloud Pub/Sub publishing over the REST API.
//!
//! The address names the project and the channel the topic. A token, when
//! set, is a service account JSON key; otherwise application default
//! credentials are used.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use notifier_auth::{GcpSource, TokenSource};
use notifier_common_http::{HttpError, OutboundRequest, Transport};
use notifier_core::{Context, Event};
use serde::Serialize;
use tracing::instrument;

use crate::credentials::CachedToken;
use crate::error::NotifyError;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";
const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";
/// Secret data key overriding the API endpoint, for emulators.
pub const ENDPOINT_SECRET_KEY: &str = "endpoint";

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct PublishRequest {
	messages: Vec<PubsubMessage>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct PubsubMessage {
	data: String,
	attributes: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct PubSub {
	publish_url: String,
	headers: BTreeMap<String, String>,
	credentials: CachedToken,
	transport: Transport,
}

impl PubSub {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let project = opts.url.trim();
		if project.is_empty() {
			return Err(NotifyError::invalid_config("googlepubsub requires a project id as address"));
		}
		if opts.channel.is_empty() {
			return Err(NotifyError::invalid_config("googlepubsub requires a topic id as channel"));
		}
		let endpoint = opts
			.secret(ENDPOINT_SECRET_KEY)
			.unwrap_or(DEFAULT_ENDPOINT)
			.trim_end_matches('/');

		let key_json = opts.token().map(str::to_string);
		let credentials = CachedToken::new(opts, PUBSUB_SCOPE, move || {
			let source: Arc<dyn TokenSource> = match key_json {
				Some(json) => Arc::new(GcpSource::from_service_account_json(&json)?),
				None => Arc::new(GcpSource::new()),
			};
			Ok(source)
		})?;

		Ok(Self {
			publish_url: format!(
				"{endpoint}/v1/projects/{project}/topics/{}:publish",
				urlencoding::encode(&opts.channel)
			),
			headers: opts.headers.clone(),
			credentials,
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(&self, event: &Event) -> Result<PublishRequest, NotifyError> {
		let data = serde_json::to_vec(event).map_err(HttpError::from)?;
		let mut attributes: BTreeMap<String, String> = event
			.annotations()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		attributes.extend(self.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
		Ok(PublishRequest {
			messages: vec![PubsubMessage {
				data: STANDARD.encode(data),
				attributes,
			}],
		})
	}
}

#[async_trait]
impl Notifier for PubSub {
	#[instrument(skip_all, fields(provider = "googlepubsub", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let token = self.credentials.get(ctx).await?;
		let req = OutboundRequest::post(&self.publish_url)
			.bearer_auth(token.as_str())
			.json(&self.payload(event)?)?;
		let result = self.transport.send(ctx, &req).await;
		if matches!(&result, Err(e) if e.status_code() == Some(401)) {
			self.credentials.invalidate();
		}
		result?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;

	fn pubsub() -> PubSub {
		PubSub::new(
			&NotifierOptions::new("my-project")
				.with_channel("flux-events")
				.with_header("team", "platform"),
		)
		.unwrap()
	}

	#[test]
	fn publish_url_from_project_and_topic() {
		assert_eq!(
			pubsub().publish_url,
			"https://pubsub.googleapis.com/v1/projects/my-project/topics/flux-events:publish"
		);
	}

	#[test]
	fn attributes_merge_metadata_and_headers() {
		let payload = pubsub().payload(&event()).unwrap();
		let msg = &payload.messages[0];
		assert_eq!(msg.attributes["cluster"], "prod");
		assert_eq!(msg.attributes["team"], "platform");

		let decoded = STANDARD.decode(&msg.data).unwrap();
		let roundtrip: Event = serde_json::from_slice(&decoded).unwrap();
		assert_eq!(roundtrip, event());
	}

	#[test]
	fn requires_project_and_topic() {
		assert!(PubSub::new(&NotifierOptions::default().with_channel("t")).is_err());
		assert!(PubSub::new(&NotifierOptions::new("p")).is_err());
	}

	#[test]
	fn rejects_malformed_service_account_key() {
		let err = PubSub::new(
			&NotifierOptions::new("p")
				.with_channel("t")
				.with_token("{not json"),
		)
		.unwrap_err();
		assert!(matches!(err, NotifyError::Auth(_)));
	}
}
