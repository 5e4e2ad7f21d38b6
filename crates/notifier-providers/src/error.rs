// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for notifier construction and delivery.

use notifier_auth::AuthError;
use notifier_common_http::{HttpError, RetryableError};
use notifier_core::{Cancelled, ParseError, Severity};
use thiserror::Error;

/// Errors returned by the factory and by [`crate::Notifier::post`].
#[derive(Debug, Error)]
pub enum NotifyError {
	/// The provider configuration cannot produce a working notifier.
	#[error("invalid provider configuration: {0}")]
	InvalidConfig(String),

	/// A commit-status event carried no revision.
	#[error("event has no revision metadata")]
	MissingRevision,

	/// A commit-status event carried a revision we could not parse.
	#[error(transparent)]
	InvalidRevision(ParseError),

	/// The severity has no counterpart in the provider's state model.
	#[error("unsupported severity '{0}'")]
	UnsupportedSeverity(Severity),

	/// No provider is registered under this type.
	#[error("unsupported provider type '{0}'")]
	UnsupportedProvider(String),

	/// A token could not be obtained.
	#[error("authentication failed: {0}")]
	Auth(#[from] AuthError),

	/// The request failed or the caller's context ended.
	#[error("delivery failed: {0}")]
	Transport(#[from] HttpError),

	/// The provider accepted the request but reported a failure in the body.
	#[error("provider rejected the notification: {0}")]
	Provider(String),
}

impl NotifyError {
	pub fn invalid_config(message: impl Into<String>) -> Self {
		Self::InvalidConfig(message.into())
	}

	pub fn provider(message: impl Into<String>) -> Self {
		Self::Provider(message.into())
	}

	/// The cancellation cause, when the delivery was aborted by its context.
	pub fn cancelled(&self) -> Option<Cancelled> {
		match self {
			NotifyError::Transport(HttpError::Cancelled(c)) => Some(*c),
			NotifyError::Auth(AuthError::Cancelled(c)) => Some(*c),
			_ => None,
		}
	}
}

impl From<Cancelled> for NotifyError {
	fn from(c: Cancelled) -> Self {
		NotifyError::Transport(HttpError::Cancelled(c))
	}
}

impl From<ParseError> for NotifyError {
	fn from(err: ParseError) -> Self {
		match err {
			ParseError::InvalidRevision { .. } => NotifyError::InvalidRevision(err),
			other => NotifyError::InvalidConfig(other.to_string()),
		}
	}
}

impl RetryableError for NotifyError {
	/// Whether the enclosing controller should re-enqueue the event.
	fn is_retryable(&self) -> bool {
		match self {
			NotifyError::Transport(e) => e.is_retryable() || e.is_cancelled(),
			NotifyError::Auth(e) => e.is_retryable() || matches!(e, AuthError::Cancelled(_)),
			NotifyError::Provider(_) => true,
			NotifyError::InvalidConfig(_)
			| NotifyError::MissingRevision
			| NotifyError::InvalidRevision(_)
			| NotifyError::UnsupportedSeverity(_)
			| NotifyError::UnsupportedProvider(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn configuration_errors_are_terminal() {
		assert!(!NotifyError::invalid_config("no token").is_retryable());
		assert!(!NotifyError::MissingRevision.is_retryable());
		assert!(!NotifyError::UnsupportedSeverity(Severity::Trace).is_retryable());
		assert!(!NotifyError::UnsupportedProvider("carrier-pigeon".into()).is_retryable());
	}

	#[test]
	fn transient_failures_are_retryable() {
		assert!(NotifyError::from(HttpError::status(503, b"")).is_retryable());
		assert!(NotifyError::from(Cancelled::DeadlineExceeded).is_retryable());
		assert!(!NotifyError::from(HttpError::status(400, b"")).is_retryable());
	}

	#[test]
	fn revision_parse_errors_map_to_invalid_revision() {
		let err: NotifyError = notifier_core::parse_revision("main@nope").unwrap_err().into();
		assert!(matches!(err, NotifyError::InvalidRevision(_)));
	}

	#[test]
	fn address_parse_errors_map_to_invalid_config() {
		let err: NotifyError = notifier_core::parse_git_address("https://github.com")
			.unwrap_err()
			.into();
		assert!(matches!(err, NotifyError::InvalidConfig(_)));
	}

	#[test]
	fn exposes_cancellation_cause() {
		let err = NotifyError::from(Cancelled::Canceled);
		assert_eq!(err.cancelled(), Some(Cancelled::Canceled));
		assert_eq!(err.to_string(), "delivery failed: context canceled");
	}
}
