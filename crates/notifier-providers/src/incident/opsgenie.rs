// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Opsgenie alerts API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::Serialize;
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::title;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const DEFAULT_URL: &str = "https://api.opsgenie.com/v2/alerts";
/// Opsgenie truncates longer alert messages.
const MAX_MESSAGE_CHARS: usize = 130;

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Alert {
	message: String,
	description: String,
	alias: String,
	details: BTreeMap<String, String>,
	tags: Vec<String>,
}

#[derive(Debug)]
pub struct Opsgenie {
	url: String,
	api_key: SecretString,
	transport: Transport,
}

impl Opsgenie {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let api_key = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("opsgenie requires an API key as token"))?;
		let url = if opts.url.trim().is_empty() {
			DEFAULT_URL.to_string()
		} else {
			opts.parsed_url()?.to_string()
		};
		Ok(Self {
			url,
			api_key: SecretString::from(api_key),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(event: &Event) -> Alert {
		let mut details: BTreeMap<String, String> = event
			.annotations()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		details.insert("severity".to_string(), event.severity.to_string());
		details.insert("reason".to_string(), event.reason.clone());

		let message: String = format!("{}: {}", title(event), event.message)
			.chars()
			.take(MAX_MESSAGE_CHARS)
			.collect();

		Alert {
			message,
			description: event.message.clone(),
			alias: title(event),
			details,
			tags: vec![
				"flux".to_string(),
				event.involved_object.kind.to_lowercase(),
				event.involved_object.namespace.clone(),
			],
		}
	}
}

#[async_trait]
impl Notifier for Opsgenie {
	#[instrument(skip_all, fields(provider = "opsgenie", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = OutboundRequest::post(&self.url)
			.header("Authorization", format!("GenieKey {}", self.api_key.expose()))
			.json(&Self::payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;

	#[test]
	fn alert_details_include_metadata_and_severity() {
		let alert = Opsgenie::payload(&event());
		assert_eq!(alert.details["cluster"], "prod");
		assert_eq!(alert.details["severity"], "info");
		assert_eq!(alert.alias, "kustomization/apps.flux-system");
	}

	#[test]
	fn message_is_truncated() {
		let mut e = event();
		e.message = "x".repeat(500);
		assert_eq!(Opsgenie::payload(&e).message.chars().count(), MAX_MESSAGE_CHARS);
	}

	#[test]
	fn defaults_url_and_requires_key() {
		assert!(Opsgenie::new(&NotifierOptions::default()).is_err());
		let og = Opsgenie::new(&NotifierOptions::default().with_token("k")).unwrap();
		assert_eq!(og.url, DEFAULT_URL);
	}
}
