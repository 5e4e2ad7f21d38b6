// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bitbucket Server and Data Center build statuses.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{parse_git_address, split_repo_id, Context, SecretString, Severity};
use serde::{Deserialize, Serialize};

use super::{require_status_id, CommitStatus, CommitStatusNotifier, StatusHost, StatusKey};
use crate::error::NotifyError;
use crate::options::NotifierOptions;

const MAX_PAGES: usize = 10;
const DESCRIPTION_LIMIT: usize = 255;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
	#[serde(default)]
	values: Vec<RemoteStatus>,
	#[serde(default = "last_page_default")]
	is_last_page: bool,
	#[serde(default)]
	next_page_start: Option<u64>,
}

fn last_page_default() -> bool {
	true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteStatus {
	key: String,
	state: String,
	#[serde(default)]
	description: Option<String>,
	#[serde(default)]
	date_added: i64,
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
	state: &'a str,
	key: &'a str,
	name: &'a str,
	description: &'a str,
	url: &'a str,
}

#[derive(Debug)]
enum Auth {
	Basic(String, SecretString),
	Bearer(SecretString),
}

#[derive(Debug)]
pub struct BitbucketServerHost {
	host: String,
	builds_url: String,
	web_url: String,
	auth: Auth,
	transport: Transport,
}

pub type BitbucketServer = CommitStatusNotifier<BitbucketServerHost>;

impl BitbucketServer {
	pub fn from_options(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let status_id = require_status_id(opts)?;
		let auth = match (opts.username.is_empty(), opts.password(), opts.token()) {
			(false, Some(password), _) => Auth::Basic(opts.username.clone(), SecretString::from(password)),
			(_, _, Some(token)) => Auth::Bearer(SecretString::from(token)),
			_ => {
				return Err(NotifyError::invalid_config(
					"bitbucketserver requires a username and password or a token",
				))
			}
		};
		let (host, id) = parse_git_address(&opts.url)?;
		let id = id.strip_prefix("scm/").unwrap_or(&id);
		let parts = split_repo_id(id, 2)?;
		let (project, repo) = (&parts[0], &parts[1]);
		Ok(CommitStatusNotifier::new(
			status_id,
			BitbucketServerHost {
				builds_url: format!("{host}/rest/api/latest/projects/{project}/repos/{repo}/commits"),
				web_url: format!("{host}/projects/{project}/repos/{repo}"),
				host,
				auth,
				transport: opts.transport()?,
			},
		))
	}
}

impl BitbucketServerHost {
	fn request(&self, req: OutboundRequest) -> OutboundRequest {
		match &self.auth {
			Auth::Basic(user, password) => req.basic_auth(user, password.expose()),
			Auth::Bearer(token) => req.bearer_auth(token.expose()),
		}
	}
}

#[async_trait]
impl StatusHost for BitbucketServerHost {
	fn kind(&self) -> &'static str {
		"bitbucketserver"
	}

	fn state(&self, severity: Severity) -> Option<&'static str> {
		match severity {
			Severity::Info => Some("SUCCESSFUL"),
			Severity::Error => Some("FAILED"),
			Severity::Trace => None,
		}
	}

	fn description_limit(&self) -> Option<usize> {
		Some(DESCRIPTION_LIMIT)
	}

	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError> {
		let mut remote: Vec<RemoteStatus> = Vec::new();
		let mut start = 0;
		for _ in 0..MAX_PAGES {
			let req = self.request(OutboundRequest::get(format!(
				"{}/rest/build-status/1.0/commits/{commit}?start={start}",
				self.host
			)));
			let page: Page = self.transport.send(ctx, &req).await?.json()?;
			remote.extend(page.values);
			match page.next_page_start {
				Some(next) if !page.is_last_page => start = next,
				_ => break,
			}
		}
		remote.sort_by(|a, b| b.date_added.cmp(&a.date_added));
		Ok(remote
			.into_iter()
			.map(|s| CommitStatus {
				key: StatusKey::named(s.key),
				state: s.state,
				description: s.description.unwrap_or_default(),
			})
			.collect())
	}

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let req = self
			.request(OutboundRequest::post(format!("{}/{commit}/builds", self.builds_url)))
			.json(&NewStatus {
				state: &status.state,
				key: &status.key.name,
				name: &status.key.name,
				description: &status.description,
				url: &self.web_url,
			})?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
