// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Commit status reporting with de-duplication.
//!
//! Every source host shares one flow, implemented by [`CommitStatusNotifier`]:
//!
//! 1. Skip `Progressing` events.
//! 2. Resolve the commit id from the `revision` metadata.
//! 3. Map the severity to the host's state vocabulary.
//! 4. List the commit's statuses and find the latest one with the same
//!    `(name, genre)` key.
//! 5. Create a new status unless that latest one already has the same state
//!    and description.
//!
//! Hosts only provide listing, creation and their state names through
//! [`StatusHost`].

pub mod azuredevops;
pub mod bitbucket;
pub mod bitbucketserver;
pub mod gitea;
pub mod github;
pub mod gitlab;

use async_trait::async_trait;
use notifier_core::{parse_revision, Context, Event, Severity};
use tracing::{info, instrument, warn};

use crate::error::NotifyError;
use crate::notifier::{skip_for_commit_status, Notifier};
use crate::options::NotifierOptions;

pub use azuredevops::AzureDevOps;
pub use bitbucket::Bitbucket;
pub use bitbucketserver::BitbucketServer;
pub use gitea::Gitea;
pub use github::GitHub;
pub use gitlab::GitLab;

/// Genre shared by every status this dispatcher writes.
pub const GENRE: &str = "fluxcd";

/// De-duplication key of a status within one commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusKey {
	pub name: String,
	/// Only hosts with a genre field fill this in; elsewhere it is `None`
	/// and matching is by name alone.
	pub genre: Option<String>,
}

impl StatusKey {
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			genre: None,
		}
	}

	pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
		self.genre = Some(genre.into());
		self
	}
}

/// A status as written to, or read back from, a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
	pub key: StatusKey,
	pub state: String,
	pub description: String,
}

impl CommitStatus {
	/// Same key, state and description.
	pub fn is_same_as(&self, other: &CommitStatus) -> bool {
		self == other
	}
}

/// `fluxcd`, or `fluxcd:<summary>` when the event carries a summary.
pub fn genre(event: &Event) -> String {
	match event.summary() {
		Some(summary) => format!("{GENRE}:{summary}"),
		None => GENRE.to_string(),
	}
}

/// Truncate to at most `max` characters.
pub(crate) fn truncate(text: &str, max: usize) -> String {
	text.chars().take(max).collect()
}

/// The commit id an event refers to.
pub fn commit_id(event: &Event) -> Result<String, NotifyError> {
	let revision = event.revision().ok_or(NotifyError::MissingRevision)?;
	Ok(parse_revision(revision)?)
}

/// Checks shared by every host constructor.
pub(crate) fn require_status_id(opts: &NotifierOptions) -> Result<String, NotifyError> {
	let id = opts.commit_status_id.trim();
	if id.is_empty() {
		return Err(NotifyError::invalid_config("commit status id cannot be empty"));
	}
	Ok(id.to_string())
}

/// The host-specific half of a commit status notifier.
#[async_trait]
pub trait StatusHost: Send + Sync {
	/// Provider type, for logs.
	fn kind(&self) -> &'static str;

	/// Host state for a severity; `None` when the host has no counterpart.
	fn state(&self, severity: Severity) -> Option<&'static str>;

	/// Key a new status is written under.
	fn key(&self, name: &str, event: &Event) -> StatusKey {
		let _ = event;
		StatusKey::named(name)
	}

	/// Longest description the host stores.
	fn description_limit(&self) -> Option<usize> {
		None
	}

	/// Statuses on `commit`, newest first.
	async fn list(&self, ctx: &Context, commit: &str) -> Result<Vec<CommitStatus>, NotifyError>;

	async fn create(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError>;

	/// Drop a cached credential after the host rejected it. Returns `true`
	/// when there was one, meaning a retry may succeed.
	fn invalidate_credentials(&self) -> bool {
		false
	}
}

/// A [`Notifier`] that writes de-duplicated commit statuses through a
/// [`StatusHost`].
#[derive(Debug)]
pub struct CommitStatusNotifier<H> {
	status_id: String,
	host: H,
}

impl<H: StatusHost> CommitStatusNotifier<H> {
	pub fn new(status_id: impl Into<String>, host: H) -> Self {
		Self {
			status_id: status_id.into(),
			host,
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	/// The status an event would produce.
	pub fn status_for(&self, event: &Event) -> Result<CommitStatus, NotifyError> {
		let state = self
			.host
			.state(event.severity)
			.ok_or(NotifyError::UnsupportedSeverity(event.severity))?;
		let description = match self.host.description_limit() {
			Some(max) => truncate(&event.message, max),
			None => event.message.clone(),
		};
		Ok(CommitStatus {
			key: self.host.key(&self.status_id, event),
			state: state.to_string(),
			description,
		})
	}

	async fn sync(&self, ctx: &Context, commit: &str, status: &CommitStatus) -> Result<(), NotifyError> {
		let existing = self.host.list(ctx, commit).await?;
		if let Some(latest) = existing.iter().find(|s| s.key == status.key) {
			if latest.is_same_as(status) {
				info!(
					provider = self.host.kind(),
					commit,
					name = %status.key.name,
					state = %status.state,
					"commit status unchanged, skipping"
				);
				return Ok(());
			}
		}
		self.host.create(ctx, commit, status).await?;
		info!(
			provider = self.host.kind(),
			commit,
			name = %status.key.name,
			state = %status.state,
			"commit status created"
		);
		Ok(())
	}
}

fn is_unauthorized(err: &NotifyError) -> bool {
	match err {
		NotifyError::Transport(e) => e.status_code() == Some(401),
		NotifyError::Auth(e) => e.is_unauthorized(),
		_ => false,
	}
}

#[async_trait]
impl<H: StatusHost> Notifier for CommitStatusNotifier<H> {
	#[instrument(skip_all, fields(provider = self.host.kind(), object = %event.object_key()))]
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError> {
		if skip_for_commit_status(event) {
			return Ok(());
		}
		let commit = commit_id(event)?;
		let status = self.status_for(event)?;

		match self.sync(ctx, &commit, &status).await {
			Err(e) if is_unauthorized(&e) && self.host.invalidate_credentials() => {
				warn!(error = %e, "credentials rejected, retrying with a fresh token");
				self.sync(ctx, &commit, &status).await
			}
			other => other,
		}
	}
}
