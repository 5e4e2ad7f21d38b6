// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! PagerDuty Events API v2.
//!
//! Error events trigger an incident keyed by the object. Info events resolve
//! that incident and record a change event; trace events only record the
//! change.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, Severity};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::NotifyError;
use crate::message::title;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

const DEFAULT_URL: &str = "https://events.pagerduty.com";

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct AlertEvent {
	routing_key: String,
	event_action: &'static str,
	dedup_key: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	payload: Option<AlertPayload>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct AlertPayload {
	summary: String,
	source: String,
	severity: &'static str,
	timestamp: DateTime<Utc>,
	component: String,
	group: String,
	class: String,
	custom_details: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ChangeEvent {
	routing_key: String,
	payload: ChangePayload,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ChangePayload {
	summary: String,
	source: String,
	timestamp: DateTime<Utc>,
	custom_details: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct PagerDuty {
	base_url: String,
	routing_key: String,
	transport: Transport,
}

fn dedup_key(event: &Event) -> String {
	let obj = &event.involved_object;
	format!("{}/{}/{}", obj.kind, obj.namespace, obj.name)
}

fn details(event: &Event) -> BTreeMap<String, String> {
	let mut details: BTreeMap<String, String> = event
		.annotations()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect();
	details.insert("message".to_string(), event.message.clone());
	details.insert("reason".to_string(), event.reason.clone());
	details
}

fn summary(event: &Event) -> String {
	format!("{}: {}", title(event), event.message)
}

impl PagerDuty {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		if opts.channel.is_empty() {
			return Err(NotifyError::invalid_config(
				"pagerduty requires an integration key as channel",
			));
		}
		let base_url = if opts.url.trim().is_empty() {
			DEFAULT_URL.to_string()
		} else {
			opts.parsed_url()?.as_str().trim_end_matches('/').to_string()
		};
		Ok(Self {
			base_url,
			routing_key: opts.channel.clone(),
			transport: opts.transport()?,
		})
	}

	pub(crate) fn trigger(&self, event: &Event) -> AlertEvent {
		let obj = &event.involved_object;
		AlertEvent {
			routing_key: self.routing_key.clone(),
			event_action: "trigger",
			dedup_key: dedup_key(event),
			payload: Some(AlertPayload {
				summary: summary(event),
				source: event.reporting_controller.clone(),
				severity: "error",
				timestamp: event.timestamp,
				component: obj.name.clone(),
				group: obj.namespace.clone(),
				class: obj.kind.clone(),
				custom_details: details(event),
			}),
		}
	}

	pub(crate) fn resolve(&self, event: &Event) -> AlertEvent {
		AlertEvent {
			routing_key: self.routing_key.clone(),
			event_action: "resolve",
			dedup_key: dedup_key(event),
			payload: None,
		}
	}

	pub(crate) fn change(&self, event: &Event) -> ChangeEvent {
		ChangeEvent {
			routing_key: self.routing_key.clone(),
			payload: ChangePayload {
				summary: summary(event),
				source: event.reporting_controller.clone(),
				timestamp: event.timestamp,
				custom_details: details(event),
			},
		}
	}

	async fn send<T: Serialize + Sync>(&self, ctx: &Context, path: &str, body: &T) -> Result<(), NotifyError> {
		let req = OutboundRequest::post(format!("{}{path}", self.base_url)).json(body)?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}

#[async_trait]
impl Notifier for PagerDuty {
	#[instrument(skip_all, fields(provider = "pagerduty", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		match event.severity {
			Severity::Error => self.send(ctx, "/v2/enqueue", &self.trigger(event)).await,
			Severity::Info => {
				self.send(ctx, "/v2/enqueue", &self.resolve(event)).await?;
				debug!("incident resolved, recording change event");
				self.send(ctx, "/v2/change/enqueue", &self.change(event)).await
			}
			Severity::Trace => self.send(ctx, "/v2/change/enqueue", &self.change(event)).await,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;

	fn pagerduty() -> PagerDuty {
		PagerDuty::new(&NotifierOptions::default().with_channel("R0UT1NG")).unwrap()
	}

	#[test]
	fn dedup_key_is_kind_namespace_name() {
		let pd = pagerduty();
		assert_eq!(pd.resolve(&event()).dedup_key, "Kustomization/flux-system/apps");
		assert_eq!(pd.trigger(&event()).dedup_key, "Kustomization/flux-system/apps");
	}

	#[test]
	fn trigger_carries_object_fields() {
		let mut e = event();
		e.severity = Severity::Error;
		let json = serde_json::to_value(pagerduty().trigger(&e)).unwrap();
		assert_eq!(json["event_action"], "trigger");
		assert_eq!(json["routing_key"], "R0UT1NG");
		assert_eq!(json["payload"]["class"], "Kustomization");
		assert_eq!(json["payload"]["group"], "flux-system");
		assert_eq!(json["payload"]["custom_details"]["cluster"], "prod");
	}

	#[test]
	fn resolve_has_no_payload() {
		let json = serde_json::to_value(pagerduty().resolve(&event())).unwrap();
		assert!(json.get("payload").is_none());
	}

	#[test]
	fn defaults_to_public_endpoint() {
		assert_eq!(pagerduty().base_url, DEFAULT_URL);
		assert!(PagerDuty::new(&NotifierOptions::default()).is_err());
	}
}
