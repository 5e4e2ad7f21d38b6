// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provider registry and the factory that turns a provider type plus
//! options into a [`Notifier`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use tracing::{debug, instrument};

use crate::bus::{EventHub, Nats, PubSub};
use crate::chat::{GoogleChat, Lark, Matrix, MsTeams, Slack, SlackFlavor, Telegram, Webex};
use crate::commit_status::{AzureDevOps, Bitbucket, BitbucketServer, Gitea, GitHub, GitLab};
use crate::dispatch::GitHubDispatch;
use crate::error::NotifyError;
use crate::incident::{Alertmanager, Datadog, Grafana, Opsgenie, PagerDuty, Sentry};
use crate::notifier::Notifier;
use crate::options::{NotifierOptions, ProviderInstance};
use crate::webhook::Forwarder;

pub type Constructor = fn(&NotifierOptions) -> Result<Box<dyn Notifier>, NotifyError>;

/// How to build one provider type.
#[derive(Clone, Copy)]
pub struct ProviderEntry {
	pub constructor: Constructor,
	/// Treat a configured password as the token when no token is set.
	pub password_as_token: bool,
}

impl std::fmt::Debug for ProviderEntry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProviderEntry")
			.field("password_as_token", &self.password_as_token)
			.finish_non_exhaustive()
	}
}

fn boxed<N: Notifier + 'static>(notifier: Result<N, NotifyError>) -> Result<Box<dyn Notifier>, NotifyError> {
	Ok(Box::new(notifier?))
}

/// Provider types and their constructors.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
	entries: BTreeMap<String, ProviderEntry>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, provider_type: impl Into<String>, entry: ProviderEntry) {
		let provider_type = provider_type.into();
		debug!(provider_type = %provider_type, "registering provider");
		self.entries.insert(provider_type, entry);
	}

	pub fn get(&self, provider_type: &str) -> Option<&ProviderEntry> {
		self.entries.get(provider_type)
	}

	/// Registered provider types in sorted order.
	pub fn types(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Every built-in provider.
	pub fn builtin() -> &'static ProviderRegistry {
		static BUILTIN: OnceLock<ProviderRegistry> = OnceLock::new();
		BUILTIN.get_or_init(|| {
			let mut registry = ProviderRegistry::new();
			let mut add = |name: &str, constructor: Constructor, password_as_token: bool| {
				registry.register(
					name,
					ProviderEntry {
						constructor,
						password_as_token,
					},
				);
			};

			add("generic", |o| boxed(Forwarder::new(o)), false);
			add("generic-hmac", |o| boxed(Forwarder::signed(o)), false);

			add("slack", |o| boxed(Slack::new(o, SlackFlavor::Slack)), false);
			add("discord", |o| boxed(Slack::new(o, SlackFlavor::Discord)), false);
			add("rocket", |o| boxed(Slack::new(o, SlackFlavor::Rocket)), false);
			add("msteams", |o| boxed(MsTeams::new(o)), false);
			add("googlechat", |o| boxed(GoogleChat::new(o)), false);
			add("webex", |o| boxed(Webex::new(o)), false);
			add("lark", |o| boxed(Lark::new(o)), false);
			add("matrix", |o| boxed(Matrix::new(o)), false);
			add("telegram", |o| boxed(Telegram::new(o)), false);

			add("opsgenie", |o| boxed(Opsgenie::new(o)), false);
			add("alertmanager", |o| boxed(Alertmanager::new(o)), false);
			add("pagerduty", |o| boxed(PagerDuty::new(o)), false);
			add("datadog", |o| boxed(Datadog::new(o)), false);
			add("grafana", |o| boxed(Grafana::new(o)), false);
			add("sentry", |o| boxed(Sentry::new(o)), false);

			add("githubdispatch", |o| boxed(GitHubDispatch::new(o)), true);
			add("googlepubsub", |o| boxed(PubSub::new(o)), false);
			add("azureeventhub", |o| boxed(EventHub::new(o)), false);
			add("nats", |o| boxed(Nats::new(o)), false);

			add("github", |o| boxed(GitHub::from_options(o)), true);
			add("gitlab", |o| boxed(GitLab::from_options(o)), true);
			add("gitea", |o| boxed(Gitea::from_options(o)), true);
			add("bitbucket", |o| boxed(Bitbucket::from_options(o)), false);
			add("bitbucketserver", |o| boxed(BitbucketServer::from_options(o)), false);
			add("azuredevops", |o| boxed(AzureDevOps::from_options(o)), true);

			registry
		})
	}
}

/// Look up a built-in provider type.
pub fn lookup(provider_type: &str) -> Result<ProviderEntry, NotifyError> {
	ProviderRegistry::builtin()
		.get(provider_type)
		.copied()
		.ok_or_else(|| NotifyError::UnsupportedProvider(provider_type.to_string()))
}

/// Every built-in provider type, sorted.
pub fn provider_types() -> Vec<&'static str> {
	ProviderRegistry::builtin().types().collect()
}

/// Builds notifiers from one options snapshot.
#[derive(Debug, Clone)]
pub struct Factory {
	options: NotifierOptions,
}

impl Factory {
	pub fn new(options: NotifierOptions) -> Self {
		Self { options }
	}

	/// Options from a resolved provider instance.
	pub fn from_instance(instance: &ProviderInstance) -> Self {
		Self::new(NotifierOptions::from_instance(instance))
	}

	pub fn options(&self) -> &NotifierOptions {
		&self.options
	}

	/// Construct the notifier registered for `provider_type`.
	#[instrument(skip(self), fields(provider = %self.options.provider_name, namespace = %self.options.provider_namespace))]
	pub fn notifier(&self, provider_type: &str) -> Result<Box<dyn Notifier>, NotifyError> {
		let entry = lookup(provider_type)?;
		self.options.ensure_token_xor_service_account()?;

		if entry.password_as_token && self.options.token().is_none() {
			if let Some(password) = self.options.password() {
				debug!("using password as token");
				let options = self.options.clone().with_token(password);
				return (entry.constructor)(&options);
			}
		}
		(entry.constructor)(&self.options)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn every_provider_type_is_registered() {
		let types = provider_types();
		for expected in [
			"generic",
			"generic-hmac",
			"slack",
			"discord",
			"rocket",
			"msteams",
			"googlechat",
			"webex",
			"lark",
			"matrix",
			"telegram",
			"opsgenie",
			"alertmanager",
			"pagerduty",
			"datadog",
			"grafana",
			"sentry",
			"githubdispatch",
			"googlepubsub",
			"azureeventhub",
			"nats",
			"github",
			"gitlab",
			"gitea",
			"bitbucket",
			"bitbucketserver",
			"azuredevops",
		] {
			assert!(types.contains(&expected), "{expected} is not registered");
		}
		assert_eq!(types.len(), 27);
	}

	#[test]
	fn unknown_type_is_unsupported() {
		let err = Factory::new(NotifierOptions::new("https://x")).notifier("carrier-pigeon").err().unwrap();
		assert!(matches!(err, NotifyError::UnsupportedProvider(t) if t == "carrier-pigeon"));
	}

	#[test]
	fn password_stands_in_for_token() {
		let opts = NotifierOptions::new("https://gitlab.com/org/repo")
			.with_password("glpat")
			.with_commit_status_id("x");
		assert!(Factory::new(opts.clone()).notifier("gitlab").is_ok());
		// opsgenie does not accept a password as its key
		assert!(Factory::new(opts).notifier("opsgenie").is_err());
	}

	#[test]
	fn token_and_service_account_conflict() {
		let opts = NotifierOptions::new("https://example.com/hook")
			.with_token("t")
			.with_service_account("sa");
		let err = Factory::new(opts).notifier("generic").err().unwrap();
		assert!(matches!(err, NotifyError::InvalidConfig(_)));
	}

	#[test]
	fn missing_credentials_fail_at_construction() {
		for provider in ["telegram", "matrix", "webex", "opsgenie", "datadog", "generic-hmac"] {
			let result = Factory::new(NotifierOptions::new("https://example.com")).notifier(provider);
			assert!(result.is_err(), "{provider} accepted empty credentials");
		}
	}

	#[test]
	fn registry_lookup() {
		let mut registry = ProviderRegistry::new();
		assert!(registry.get("generic").is_none());
		registry.register(
			"generic",
			ProviderEntry {
				constructor: |o| boxed(Forwarder::new(o)),
				password_as_token: false,
			},
		);
		assert!(registry.get("generic").is_some());
	}

	proptest! {
		#[test]
		fn lookup_only_accepts_registered_types(name in "[a-z-]{1,20}") {
			let registered = provider_types().contains(&name.as_str());
			prop_assert_eq!(lookup(&name).is_ok(), registered);
		}
	}
}
