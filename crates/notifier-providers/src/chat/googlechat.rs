// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Google Chat incoming webhook cards.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event};
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::title;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug)]
pub struct GoogleChat {
	url: String,
	transport: Transport,
}

impl GoogleChat {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		Ok(Self {
			url: opts.parsed_url()?.to_string(),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(event: &Event) -> Value {
		let mut sections = vec![json!({
			"widgets": [{"textParagraph": {"text": event.message}}],
		})];

		let widgets: Vec<Value> = event
			.annotations()
			.map(|(k, v)| json!({"keyValue": {"topLabel": k, "content": v}}))
			.collect();
		if !widgets.is_empty() {
			sections.push(json!({"widgets": widgets}));
		}

		json!({
			"cards": [{
				"header": {"title": title(event), "subtitle": event.severity.as_str()},
				"sections": sections,
			}],
		})
	}
}

#[async_trait]
impl Notifier for GoogleChat {
	#[instrument(skip_all, fields(provider = "googlechat", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = OutboundRequest::post(&self.url).json(&Self::payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;

	#[test]
	fn card_layout() {
		let payload = GoogleChat::payload(&event());
		let card = &payload["cards"][0];
		assert_eq!(card["header"]["title"], "kustomization/apps.flux-system");
		assert_eq!(
			card["sections"][0]["widgets"][0]["textParagraph"]["text"],
			"Reconciliation finished"
		);
		assert_eq!(card["sections"][1]["widgets"][0]["keyValue"]["topLabel"], "cluster");
	}

	#[test]
	fn no_metadata_section_without_annotations() {
		let mut e = event();
		e.metadata.clear();
		let payload = GoogleChat::payload(&e);
		assert_eq!(payload["cards"][0]["sections"].as_array().unwrap().len(), 1);
	}
}
