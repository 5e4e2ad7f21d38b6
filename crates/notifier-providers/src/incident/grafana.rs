// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Grafana Graphite-style annotations (`/api/annotations/graphite`).

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, SecretString};
use serde::Serialize;
use tracing::instrument;

use crate::error::NotifyError;
use crate::message::title;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Annotation {
	what: String,
	tags: Vec<String>,
	when: i64,
	data: String,
}

#[derive(Debug)]
pub struct Grafana {
	url: String,
	token: Option<SecretString>,
	basic: Option<(String, SecretString)>,
	transport: Transport,
}

impl Grafana {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		let basic = match (opts.username.is_empty(), opts.password()) {
			(false, Some(password)) => Some((opts.username.clone(), SecretString::from(password))),
			_ => None,
		};
		Ok(Self {
			url: url.to_string(),
			token: opts.token().map(SecretString::from),
			basic,
			transport: opts.transport()?,
		})
	}

	pub(crate) fn payload(event: &Event) -> Annotation {
		let mut tags = vec![
			"flux".to_string(),
			event.reporting_controller.clone(),
			event.severity.to_string(),
		];
		tags.extend(event.annotations().map(|(k, v)| format!("{k}: {v}")));
		Annotation {
			what: title(event),
			tags,
			when: event.timestamp.timestamp(),
			data: event.message.clone(),
		}
	}
}

#[async_trait]
impl Notifier for Grafana {
	#[instrument(skip_all, fields(provider = "grafana", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let mut req = OutboundRequest::post(&self.url).json(&Self::payload(event))?;
		if let Some((user, password)) = &self.basic {
			req = req.basic_auth(user, password.expose());
		} else if let Some(token) = &self.token {
			req = req.bearer_auth(token.expose());
		}
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
