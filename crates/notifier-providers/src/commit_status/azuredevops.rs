// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Azure DevOps Git commit statuses.
//!
//! Statuses carry a `context{name, genre}` pair, so this is the one host
//! where the genre takes part in de-duplication. A token is used as a
//! personal access token; without one, a managed identity token is fetched
//! through the token cache.

use std::sync::Arc;

use async_trait::async_trait;
use notifier_auth::{AzureImdsSource, TokenSource};
use notifier_common_http::{OutboundRequest, Transport};
use notifier_core::{parse_git_address, split_repo_id, Context, Event, SecretString, Severity};
use serde::{Deserialize, Serialize};

use super::{genre, require_status_id, CommitStatus, CommitStatusNotifier, StatusHost, StatusKey};
use crate::credentials::CachedToken;
use crate::error::NotifyError;
use crate::options::NotifierOptions;

const API_VERSION: &str = "6.0";
/// Resource id of Azure DevOps in Entra ID.
pub const AZURE_DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct StatusContext {
	name: String,
	#[serde(default)]
	genre: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusList {
	#[serde(default)]
	value: Vec<RemoteStatus>,
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
	#[serde(default)]
	id: u64,
	state: String,
	#[serde(default)]
	description: Option<String>,
	context: StatusContext,
}

#[derive(Debug, Serialize)]
struct NewStatus<'a> {
	state: &'a str,
	description: &'a str,
	context: StatusContext,
}

#[derive(Debug)]
enum Auth {
	Pat(SecretString),
	ManagedIdentity(CachedToken),
}

#[derive(Debug)]
pub struct AzureDevOpsHost {
	statuses_url: String,
	auth: Auth,
	transport: Transport,
}

pub type AzureDevOps = CommitStatusNotifier<AzureDevOpsHost>;

impl AzureDevOps {
	pub fn from_options(opts: &NotifierOptions) -> Result<Self, NotifyError> {
		let status_id = require_status_id(opts)?;
		let (host, id) = parse_git_address(&opts.url)?;
		let parts = split_repo_id(&id, 4)?;
		if parts[2] != "_git" {
			return Err(NotifyError::invalid_config(format!(
				"azure devops address must be <org>/<project>/_git/<repository>, got '{id}'"
			)));
		}
		let (org, project, repo) = (&parts[0], &parts[1], &parts[3]);

		let auth = match opts.token() {
			Some(pat) => Auth::Pat(SecretString::from(pat)),
			None => Auth::ManagedIdentity(CachedToken::new(opts, AZURE_DEVOPS_SCOPE, || {
				let source: Arc<dyn TokenSource> = Arc::new(AzureImdsSource::from_env()?);
				Ok(source)
			})?),
		};

		Ok(CommitStatusNotifier::new(
			status_id,
			AzureDevOpsHost {
				statuses_url: format!("{host}/{org}/{project}/_apis/git/repositories/{repo}/commits"),
				auth,
				transport: opts.transport()?,
			},
		))
	}
}

impl AzureDevOpsHost {
	async fn request(&self, ctx: &Context, req: OutboundRequest) -> Result<OutboundRequest, NotifyError> {
		Ok(match &self.auth {
			Auth::Pat(pat) => req.basic_auth("", pat.expose()),
			Auth::ManagedIdentity(cached) => req.bearer_auth(cached.get(ctx).await?.as_str()),
		})
	}

	fn url(&self, commit: &str) -> String {
		format!("{}/{commit}/statuses?api-version={API_VERSION}", self.statuses_url)
	}
}

#[async_trait]
impl StatusHost for AzureDevOpsHost {
	fn kind(&self) -> &'static str {
		"azuredevops"
	}

	fn state(&self, severity: Severity) -> Option<&'static str> {
		match severity {
			Severity::Info => Some("succeeded"),
			Severity::Error => Some("error"),
			Severity::Trace => None,
		}
	}

	fn key(&self, name: &str, event: &Event) -> StatusKey {
		StatusKey::named(name).with_genre(genre(event))
	}

	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError> {
		let req = self.request(ctx, OutboundRequest::get(self.url(commit))).await?;
		let mut list: StatusList = self.transport.send(ctx, &req).await?.json()?;
		list.value.sort_by(|a, b| b.id.cmp(&a.id));
		Ok(list
			.value
			.into_iter()
			.map(|s| CommitStatus {
				key: StatusKey {
					name: s.context.name,
					genre: s.context.genre,
				},
				state: s.state,
				description: s.description.unwrap_or_default(),
			})
			.collect())
	}

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let req = self
			.request(ctx, OutboundRequest::post(self.url(commit)))
			.await?
			.json(&NewStatus {
				state: &status.state,
				description: &status.description,
				context: StatusContext {
					name: status.key.name.clone(),
					genre: status.key.genre.clone(),
				},
			})?;
		self.transport.send(ctx, &req).await?;
		Ok(())
	}

	fn invalidate_credentials(&self) -> bool {
		match &self.auth {
			Auth::ManagedIdentity(cached) => {
				cached.invalidate();
				true
			}
			Auth::Pat(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::fixtures::event;

	fn opts(address: &str) -> NotifierOptions {
		NotifierOptions::new(address)
			.with_token("pat")
			.with_commit_status_id("kustomization/apps")
	}

	#[test]
	fn statuses_url_from_address() {
		let ado = AzureDevOps::from_options(&opts("https://dev.azure.com/org/proj/_git/repo")).unwrap();
		assert_eq!(
			ado.host().url("abc"),
			"https://dev.azure.com/org/proj/_apis/git/repositories/repo/commits/abc/statuses?api-version=6.0"
		);
	}

	#[test]
	fn address_arity_is_checked() {
		assert!(AzureDevOps::from_options(&opts("https://dev.azure.com/org/proj/repo")).is_err());
		assert!(AzureDevOps::from_options(&opts("https://dev.azure.com/org/proj/x/repo")).is_err());
	}

	#[test]
	fn key_carries_genre() {
		let ado = AzureDevOps::from_options(&opts("https://dev.azure.com/org/proj/_git/repo")).unwrap();
		let mut e = event();
		e.metadata.insert("summary".to_string(), "prod".to_string());
		let status = ado.status_for(&e).unwrap();
		assert_eq!(status.key.genre.as_deref(), Some("fluxcd:prod"));
		assert_eq!(status.state, "succeeded");
	}

	#[test]
	fn pat_has_nothing_to_invalidate() {
		let ado = AzureDevOps::from_options(&opts("https://dev.azure.com/org/proj/_git/repo")).unwrap();
		assert!(!ado.host().invalidate_credentials());
	}
}
