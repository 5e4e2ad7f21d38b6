// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bitbucket Cloud build statuses.
//!
//! Credentials are a username and app password, given either as the
//! username/password options or as a `username:app-password` token.

use async_trait::async_trait;
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{parse_git_address, split_repo_id, Context, Event, SecretString, Severity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{require_status_id, CommitStatus, CommitStatusNotifier, StatusHost, StatusKey};
use crate::error::NotifyError;
use crate::options::NotifierOptions;

/// Bitbucket rejects build status keys longer than this.
const MAX_KEY_CHARS: usize = 40;
const MAX_PAGES: usize = 10;

/// The status key for a name: the name itself when short enough, otherwise
/// a stable hash prefix.
pub(crate) fn status_key(name: &str) -> String {
	if name.chars().count() <= MAX_KEY_CHARS {
		name.to_string()
	} else {
		hex::encode(Sha256::digest(name.as_bytes()))[..MAX_KEY_CHARS].to_string()
	}
}

#[derive(Debug, Deserialize)]
struct Page {
	#[serde(default)]
	values: Vec<RemoteStatus>,
	#[serde(default)]
	next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
	key: String,
	state: String,
	#[serde(default)]
	description: Option<String>,
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
pub struct BitbucketHost {
	api_url: String,
	web_url: String,
	status_name: String,
	username: String,
	password: SecretString,
	transport: Transport,
}

pub type Bitbucket = CommitStatusNotifier<BitbucketHost>;

fn credentials(opts: &NotifierOptions) -> Result<(String, SecretString), NotifyError> {
	if let (false, Some(password)) = (opts.username.is_empty(), opts.password()) {
		return Ok((opts.username.clone(), SecretString::from(password)));
	}
	match opts.token().and_then(|t| t.split_once(':')) {
		Some((user, password)) if !user.is_empty() && !password.is_empty() => {
			Ok((user.to_string(), SecretString::from(password)))
		}
		_ => Err(NotifyError::invalid_config(
			"bitbucket requires credentials in the form 'username:app-password'",
		)),
	}
}

impl Bitbucket {
	pub fn from_options(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let status_id = require_status_id(opts)?;
		let (username, password) = credentials(opts)?;
		let (host, id) = parse_git_address(&opts.url)?;
		let parts = split_repo_id(&id, 2)?;
		let api_root = if host == "https://bitbucket.org" {
			"https://api.bitbucket.org/2.0".to_string()
		} else {
			format!("{host}/2.0")
		};
		Ok(CommitStatusNotifier::new(
			status_id.clone(),
			BitbucketHost {
				api_url: format!("{api_root}/repositories/{}/{}", parts[0], parts[1]),
				web_url: format!("{host}/{}/{}", parts[0], parts[1]),
				status_name: status_id,
				username,
				password,
				transport: opts.transport()?,
			},
		))
	}
}

impl BitbucketHost {
	fn request(&self, req: OutboundRequest) -> OutboundRequest {
		req.basic_auth(&self.username, self.password.expose())
	}
}

#[async_trait]
impl StatusHost for BitbucketHost {
	fn kind(&self) -> &'static str {
		"bitbucket"
	}

	fn state(&self, severity: Severity) -> Option<&'static str> {
		match severity {
			Severity::Info => Some("SUCCESSFUL"),
			Severity::Error => Some("FAILED"),
			Severity::Trace => None,
		}
	}

	fn key(&self, name: &str, _event: &Event) -> StatusKey {
		StatusKey::named(status_key(name))
	}

	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError> {
		let mut statuses = Vec::new();
		let mut url = Some(format!(
			"{}/commit/{commit}/statuses?pagelen=100&sort=-created_on",
			self.api_url
		));
		let mut pages = 0;
		while let Some(next) = url.take() {
			let req = self.request(OutboundRequest::get(next));
			let page: Page = self.transport.send(ctx, &req).await?.json()?;
			statuses.extend(page.values.into_iter().map(|s| CommitStatus {
				key: StatusKey::named(s.key),
				state: s.state,
				description: s.description.unwrap_or_default(),
			}));
			pages += 1;
			if pages < MAX_PAGES {
				url = page.next;
			}
		}
		Ok(statuses)
	}

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let req = self
			.request(OutboundRequest::post(format!(
				"{}/commit/{commit}/statuses/build",
				self.api_url
			)))
			.json(&NewStatus {
				state: &status.state,
				key: &status.key.name,
				name: &self.status_name,
				description: &status.description,
				url: &self.web_url,
			})?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}
}
