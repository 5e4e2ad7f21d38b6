// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitLab commit statuses (API v4).

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{parse_git_address, Context, SecretString, Severity};
use serde::{Deserialize, Serialize};

use super::{require_status_id, CommitStatus, CommitStatusNotifier, StatusHost, StatusKey};
use crate::error::NotifyError;
use crate::options::NotifierOptions;

const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct RemoteStatus {
	id: u64,
	name: String,
	status: String,
	#[serde(default)]
	description: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
	state: &'a str,
	name: &'a str,
	description: &'a str,
}

#[derive(Debug)]
pub struct GitLabHost {
	project_url: String,
	token: SecretString,
	transport: Transport,
}

pub type GitLab = CommitStatusNotifier<GitLabHost>;

impl GitLab {
	pub fn from_options(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let status_id = require_status_id(opts)?;
		let token = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("gitlab requires a token"))?;
		let (host, id) = parse_git_address(&opts.url)?;
		// Projects may live in nested groups, so only a lower bound applies.
		if id.split('/').filter(|p| !p.is_empty()).count() < 2 {
			return Err(NotifyError::invalid_config(format!(
				"gitlab project path '{id}' must include a group"
			)));
		}
		Ok(CommitStatusNotifier::new(
			status_id,
			GitLabHost {
				project_url: format!("{host}/api/v4/projects/{}", urlencoding::encode(&id)),
				token: SecretString::from(token),
				transport: opts.transport()?,
			},
		))
	}
}

impl GitLabHost {
	fn request(&self, req: OutboundRequest) -> OutboundRequest {
		req.header("PRIVATE-TOKEN", self.token.expose().as_str())
	}
}

#[async_trait]
impl StatusHost for GitLabHost {
	fn kind(&self) -> &'static str {
		"gitlab"
	}

	fn state(&self, severity: Severity) -> Option<&'static str> {
		match severity {
			Severity::Info => Some("success"),
			Severity::Error => Some("failed"),
			Severity::Trace => None,
		}
	}

	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError> {
		let mut remote: Vec<RemoteStatus> = Vec::new();
		for page in 1..=MAX_PAGES {
			let req = self.request(OutboundRequest::get(format!(
				"{}/repository/commits/{commit}/statuses?per_page={PAGE_SIZE}&page={page}&all=true",
				self.project_url
			)));
			let batch: Vec<RemoteStatus> = self.transport.send(ctx, &req).await?.json()?;
			let done = batch.len() < PAGE_SIZE;
			remote.extend(batch);
			if done {
				break;
			}
		}
		remote.sort_by(|a, b| b.id.cmp(&a.id));
		Ok(remote
			.into_iter()
			.map(|s| CommitStatus {
				key: StatusKey::named(s.name),
				state: s.status,
				description: s.description.unwrap_or_default(),
			})
			.collect())
	}

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let req = self
			.request(OutboundRequest::post(format!("{}/statuses/{commit}", self.project_url)))
			.json(&NewStatus {
				state: &status.state,
				name: &status.key.name,
				description: &status.description,
			})?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
