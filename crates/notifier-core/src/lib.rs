// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared model for the notification dispatcher.
//!
//! This crate provides:
//! - [`Event`]: the normalized control-plane event every notifier consumes
//! - [`parse`]: git address and revision parsers used by commit-status hosts
//! - [`Context`]: cancellation and deadline propagation for a delivery
//! - [`Secret`]: a wrapper that keeps credentials out of logs

pub mod context;
pub mod error;
pub mod event;
pub mod parse;
pub mod secret;

pub use context::{Cancelled, Context};
pub use error::{EventError, ParseError};
pub use event::{
	Event, ObjectReference, Severity, COMMIT_STATUS_UPDATE, META_COMMIT_STATUS, META_ORIGIN_REVISION,
	META_REVISION, META_SUMMARY, REASON_PROGRESSING,
};
pub use parse::{parse_git_address, parse_revision, split_repo_id};
pub use secret::{Secret, SecretString, REDACTED};
