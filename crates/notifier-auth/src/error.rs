// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for token acquisition.

use std::sync::Arc;

use notifier_common_http::{HttpError, RetryableError};
use notifier_core::Cancelled;
use thiserror::Error;

/// Errors that can occur while acquiring a token.
///
/// Cloneable so one failed fetch can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
	/// Missing or malformed credentials.
	#[error("invalid auth configuration: {0}")]
	InvalidConfig(String),

	/// JWT signing/encoding error.
	#[error("JWT error: {0}")]
	Jwt(String),

	/// The token endpoint could not be reached or answered with an error.
	#[error("token request failed: {0}")]
	Transport(#[source] Arc<HttpError>),

	/// The token endpoint answered with something we could not use.
	#[error("invalid token response: {0}")]
	InvalidResponse(String),

	/// A credential provider outside our HTTP stack failed.
	#[error("token source error: {message}")]
	Source { message: String, retryable: bool },

	/// The caller's context was cancelled or its deadline passed.
	#[error(transparent)]
	Cancelled(#[from] Cancelled),
}

impl From<HttpError> for AuthError {
	fn from(err: HttpError) -> Self {
		match err {
			HttpError::Cancelled(c) => AuthError::Cancelled(c),
			other => AuthError::Transport(Arc::new(other)),
		}
	}
}

impl AuthError {
	pub fn invalid_config(message: impl Into<String>) -> Self {
		Self::InvalidConfig(message.into())
	}

	/// True when the token endpoint rejected the presented credentials.
	pub fn is_unauthorized(&self) -> bool {
		match self {
			AuthError::Transport(e) => e.status_code() == Some(401),
			_ => false,
		}
	}
}

impl RetryableError for AuthError {
	fn is_retryable(&self) -> bool {
		match self {
			AuthError::Transport(e) => e.is_retryable(),
			AuthError::Source { retryable, .. } => *retryable,
			AuthError::InvalidConfig(_)
			| AuthError::Jwt(_)
			| AuthError::InvalidResponse(_)
			| AuthError::Cancelled(_) => false,
		}
	}
}
