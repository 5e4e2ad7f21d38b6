// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors returned by the address and revision parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
	#[error("invalid address '{address}': {reason}")]
	InvalidAddress { address: String, reason: String },

	#[error("address '{address}' has no repository path")]
	MissingPath { address: String },

	#[error("invalid revision '{revision}'")]
	InvalidRevision { revision: String },

	#[error("invalid repository id '{id}': expected {expected} path components, got {found}")]
	RepoIdArity {
		id: String,
		expected: usize,
		found: usize,
	},
}

/// Violations of the event invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
	#[error("event timestamp is zero")]
	ZeroTimestamp,

	#[error("involved object {field} is empty")]
	EmptyObjectField { field: &'static str },

	#[error("metadata value for '{key}' exceeds {limit} bytes")]
	MetadataTooLong { key: String, limit: usize },

	#[error("metadata value for '{key}' contains non-printable characters")]
	MetadataNotPrintable { key: String },
}
