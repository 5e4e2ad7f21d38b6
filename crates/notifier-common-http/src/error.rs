// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use notifier_core::Cancelled;
use thiserror::Error;

use crate::retry::RetryableError;

/// Bytes of a failed response body kept in [`HttpError::Status`].
pub(crate) const BODY_PREFIX_LIMIT: usize = 512;

/// Errors produced by the HTTP transport.
#[derive(Debug, Error)]
pub enum HttpError {
	/// The client or request could not be built (bad proxy, bad PEM, bad URL).
	#[error("invalid transport configuration: {0}")]
	Config(String),

	/// Network-level error during HTTP communication.
	#[error("network error: {0}")]
	Network(#[from] reqwest::Error),

	/// The server answered with a non-2xx status.
	#[error("request failed with status {status}: {body}")]
	Status { status: u16, body: String },

	/// The request body could not be encoded.
	#[error("failed to encode request body: {0}")]
	Encode(#[from] serde_json::Error),

	/// The caller's context was cancelled or its deadline passed.
	#[error(transparent)]
	Cancelled(#[from] Cancelled),
}

impl HttpError {
	/// Build a status error, keeping only a prefix of the response body.
	pub fn status(status: u16, body: &[u8]) -> Self {
		let prefix = &body[..body.len().min(BODY_PREFIX_LIMIT)];
		Self::Status {
			status,
			body: String::from_utf8_lossy(prefix).into_owned(),
		}
	}

	/// The HTTP status code, when the server answered.
	pub fn status_code(&self) -> Option<u16> {
		match self {
			HttpError::Status { status, .. } => Some(*status),
			HttpError::Network(e) => e.status().map(|s| s.as_u16()),
			_ => None,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, HttpError::Cancelled(_))
	}
}

impl RetryableError for HttpError {
	fn is_retryable(&self) -> bool {
		match self {
			HttpError::Network(e) => e.is_retryable(),
			HttpError::Status { status, .. } => *status == 429 || *status >= 500,
			HttpError::Config(_) | HttpError::Encode(_) | HttpError::Cancelled(_) => false,
		}
	}
}
