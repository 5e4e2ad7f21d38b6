// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Gitea and Forgejo commit statuses.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{parse_git_address, split_repo_id, Context, SecretString, Severity};
use serde::{Deserialize, Serialize};

use super::{require_status_id, CommitStatus, CommitStatusNotifier, StatusHost, StatusKey};
use crate::error::NotifyError;
use crate::options::NotifierOptions;

const PAGE_SIZE: usize = 50;
const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct RemoteStatus {
	id: u64,
	#[serde(default)]
	context: String,
	status: String,
	#[serde(default)]
	description: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
	state: &'a str,
	context: &'a str,
	description: &'a str,
}

#[derive(Debug)]
pub struct GiteaHost {
	repo_url: String,
	token: SecretString,
	transport: Transport,
}

pub type Gitea = CommitStatusNotifier<GiteaHost>;

impl Gitea {
	pub fn from_options(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let status_id = require_status_id(opts)?;
		let token = opts
			.token()
			.ok_or_else(|| NotifyError::invalid_config("gitea requires a token"))?;
		let (host, id) = parse_git_address(&opts.url)?;
		let parts = split_repo_id(&id, 2)?;
		Ok(CommitStatusNotifier::new(
			status_id,
			GiteaHost {
				repo_url: format!("{host}/api/v1/repos/{}/{}", parts[0], parts[1]),
				token: SecretString::from(token),
				transport: opts.transport()?,
			},
		))
	}
}

impl GiteaHost {
	fn request(&self, req: OutboundRequest) -> OutboundRequest {
		req.header("Authorization", format!("token {}", self.token.expose()))
	}
}

#[async_trait]
impl StatusHost for GiteaHost {
	fn kind(&self) -> &'static str {
		"gitea"
	}

	fn state(&self, severity: Severity) -> Option<&'static str> {
		match severity {
			Severity::Info => Some("success"),
			Severity::Error => Some("failure"),
			Severity::Trace => None,
		}
	}

	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError> {
		let mut remote: Vec<RemoteStatus> = Vec::new();
		for page in 1..=MAX_PAGES {
			let req = self.request(OutboundRequest::get(format!(
				"{}/commits/{commit}/statuses?page={page}&limit={PAGE_SIZE}",
				self.repo_url
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
				key: StatusKey::named(s.context),
				state: s.status,
				description: s.description.unwrap_or_default(),
			})
			.collect())
	}

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let req = self
			.request(OutboundRequest::post(format!("{}/statuses/{commit}", self.repo_url)))
			.json(&NewStatus {
				state: &status.state,
				context: &status.key.name,
				description: &status.description,
			})?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn repo_url_from_address() {
		let gitea = Gitea::from_options(
			&NotifierOptions::new("https://gitea.example.com:3000/org/repo.git")
				.with_token("t")
				.with_commit_status_id("x"),
		)
		.unwrap();
		assert_eq!(
			gitea.host().repo_url,
			"https://gitea.example.com:3000/api/v1/repos/org/repo"
		);
	}

	#[test]
	fn requires_token() {
		assert!(Gitea::from_options(
			&NotifierOptions::new("https://gitea.example.com/org/repo").with_commit_status_id("x")
		)
		.is_err());
	}
}
