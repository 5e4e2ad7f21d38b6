// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitHub and GitHub Enterprise commit statuses.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{parse_git_address, split_repo_id, Context, Severity};
use serde::{Deserialize, Serialize};

use super::{require_status_id, CommitStatus, CommitStatusNotifier, StatusHost, StatusKey};
use crate::credentials::GithubAuth;
use crate::error::NotifyError;
use crate::options::NotifierOptions;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const DESCRIPTION_LIMIT: usize = 140;
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 10;

/// REST API root for a repository host: `api.github.com` for github.com,
/// `<host>/api/v3` for GitHub Enterprise.
pub(crate) fn api_base(host: &str) -> String {
	if host == "https://github.com" || host == "https://www.github.com" {
		"https://api.github.com".to_string()
	} else {
		format!("{host}/api/v3")
	}
}

/// Owner and repository from a git address, plus the API root.
pub(crate) fn repository(address: &str) -> Result<(String, String, String), NotifyError> {
	let (host, id) = parse_git_address(address)?;
	let parts = split_repo_id(&id, 2)?;
	Ok((api_base(&host), parts[0].clone(), parts[1].clone()))
}

/// Request with the headers every GitHub API call carries.
pub(crate) fn api_request(req: OutboundRequest, token: &str) -> OutboundRequest {
	req.bearer_auth(token)
		.header("Accept", ACCEPT)
		.header("X-GitHub-Api-Version", API_VERSION)
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
	#[serde(default)]
	context: String,
	state: String,
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
pub struct GitHubHost {
	repo_url: String,
	auth: GithubAuth,
	transport: Transport,
}

/// Commit status notifier for the `github` provider type.
pub type GitHub = CommitStatusNotifier<GitHubHost>;

impl GitHub {
	pub fn from_options(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let status_id = require_status_id(opts)?;
		let (api, owner, repo) = repository(&opts.url)?;
		let transport = opts.transport()?;
		let auth = GithubAuth::from_options(opts, &transport)?;
		Ok(CommitStatusNotifier::new(
			status_id,
			GitHubHost {
				repo_url: format!("{api}/repos/{owner}/{repo}"),
				auth,
				transport,
			},
		))
	}
}

#[async_trait]
impl StatusHost for GitHubHost {
	fn kind(&self) -> &'static str {
		"github"
	}

	fn state(&self, severity: Severity) -> Option<&'static str> {
		match severity {
			Severity::Info => Some("success"),
			Severity::Error => Some("failure"),
			Severity::Trace => None,
		}
	}

	fn description_limit(&self) -> Option<usize> {
		Some(DESCRIPTION_LIMIT)
	}

	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError> {
		let token = self.auth.token(ctx).await?;
		let mut statuses = Vec::new();
		for page in 1..=MAX_PAGES {
			let req = api_request(
				OutboundRequest::get(format!(
					"{}/commits/{commit}/statuses?per_page={PAGE_SIZE}&page={page}",
					self.repo_url
				)),
				&token,
			);
			let batch: Vec<RemoteStatus> = self.transport.send(ctx, &req).await?.json()?;
			let done = batch.len() < PAGE_SIZE;
			statuses.extend(batch.into_iter().map(|s| CommitStatus {
				key: StatusKey::named(s.context),
				state: s.state,
				description: s.description.unwrap_or_default(),
			}));
			if done {
				break;
			}
		}
		Ok(statuses)
	}

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let token = self.auth.token(ctx).await?;
		let req = api_request(
			OutboundRequest::post(format!("{}/statuses/{commit}", self.repo_url)),
			&token,
		)
		.json(&NewStatus {
			state: &status.state,
			context: &status.key.name,
			description: &status.description,
		})?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}

	fn invalidate_credentials(&self) -> bool {
		self.auth.invalidate();
		self.auth.is_app()
	}
}
