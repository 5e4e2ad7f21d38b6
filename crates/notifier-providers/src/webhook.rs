// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Generic webhook forwarding of the raw event.

use std::collections::BTreeMap;

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event, Secret};
use tracing::{debug, instrument};

use crate::error::NotifyError;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

/// Header naming the controller that reported the event.
pub const COMPONENT_HEADER: &str = "gotk-component";

/// POSTs the full event JSON to an arbitrary URL, optionally signing the
/// body with HMAC-SHA256.
#[derive(Debug)]
pub struct Forwarder {
	url: String,
	transport: Transport,
	headers: BTreeMap<String, String>,
	hmac_key: Option<Secret<Vec<u8>>>,
}

impl Forwarder {
	/// Unsigned forwarder (`generic`).
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let url = opts.parsed_url()?;
		Ok(Self {
			url: url.to_string(),
			transport: opts.transport()?,
			headers: opts.headers.clone(),
			hmac_key: None,
		})
	}

	/// Forwarder whose body is signed with the provider token (`generic-hmac`).
	pub fn signed(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let key = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("generic-hmac requires a token to sign with"))?;
		let mut forwarder = Self::new(opts)?;
		forwarder.hmac_key = Some(Secret::new(key.as_bytes().to_vec()));
		Ok(forwarder)
	}

	pub(crate) fn request(&self, event: &Event) -> Result<OutboundRequest, NotifyError> {
		let mut req = OutboundRequest::post(&self.url)
			.header(COMPONENT_HEADER, &event.reporting_controller)
			.headers(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
			.json(event)?;
		if let Some(key) = &self.hmac_key {
			req = req.sign_with(key.expose());
		}
		Ok(req)
	}
}

#[async_trait]
impl Notifier for Forwarder {
	#[instrument(skip_all, fields(provider = "generic", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		let req = self.request(event)?;
		self.transport.send(ctx, &req).await?;
		debug!(signed = self.hmac_key.is_some(), "event forwarded");
		Ok(())
	}
}
