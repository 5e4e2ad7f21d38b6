// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitHub `repository_dispatch` events, for triggering workflows.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{Context, Event};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::commit_status::github::{api_request, repository};
use crate::credentials::GithubAuth;
use crate::error::NotifyError;
use crate::notifier::{skip_for_message_sink, Notifier};
use crate::options::NotifierOptions;

#[derive(Debug, Serialize)]
pub(crate) struct DispatchRequest<'a> {
	event_type: String,
	client_payload: &'a Event,
}

#[derive(Debug)]
pub struct GitHubDispatch {
	dispatch_url: String,
	auth: GithubAuth,
	transport: Transport,
}

impl GitHubDispatch {
	pub fn new(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let (api, owner, repo) = repository(&opts.url)?;
		let transport = opts.transport()?;
		Ok(Self {
			dispatch_url: format!("{api}/repos/{owner}/{repo}/dispatches"),
			auth: GithubAuth::from_options(opts, &transport)?,
			transport,
		})
	}

	pub(crate) fn payload(event: &Event) -> DispatchRequest<'_> {
		DispatchRequest {
			event_type: event.object_key(),
			client_payload: event,
		}
	}

	async fn dispatch(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		let token = self.auth.token(ctx).await?;
		let req = api_request(OutboundRequest::post(&self.dispatch_url), &token).json(&Self::payload(event))?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}

#[async_trait]
impl Notifier for GitHubDispatch {
	#[instrument(skip_all, fields(provider = "githubdispatch", object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_message_sink(event) {
			return Ok(());
		}
		match self.dispatch(ctx, event).await {
			Err(NotifyError::Transport(e)) if e.status_code() == Some(401) && self.auth.is_app() => {
				warn!("installation token rejected, retrying with a fresh token");
				self.auth.invalidate();
				self.dispatch(ctx, event).await
			}
			other => other,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;

	#[test]
	fn event_type_is_object_key() {
		let e = event();
		let json = serde_json::to_value(GitHubDispatch::payload(&e)).unwrap();
		assert_eq!(json["event_type"], "kustomization/apps.flux-system");
		assert_eq!(json["client_payload"]["involvedObject"]["name"], "apps");
	}

	#[test]
	fn dispatch_url_from_address() {
		let d = GitHubDispatch::new(&NotifierOptions::new("https://github.com/org/repo").with_token("t")).unwrap();
		assert_eq!(d.dispatch_url, "https://api.github.com/repos/org/repo/dispatches");
		assert!(GitHubDispatch::new(&NotifierOptions::new("https://github.com/org/repo")).is_err());
	}
}
