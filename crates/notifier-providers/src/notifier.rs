// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The notifier trait every provider adapter implements.

use async_trait::async_trait;
use notifier_core::{Context, Event};

use crate::error::NotifyError;

/// Delivers events to one configured provider.
///
/// Implementations are bound to an immutable options snapshot and are safe
/// to call concurrently. A failed `post` leaves the notifier usable.
#[async_trait]
pub trait Notifier: Send + Sync {
	/// Deliver `event`. Skipped events return `Ok(())` without any I/O.
	async fn post(&self, ctx: &Context, event: &Event) -> Result<(), NotifyError>;
}

/// Non-commit-status providers ignore events that only refresh a commit status.
pub(crate) fn skip_for_message_sink(event: &Event) -> bool {
	if event.is_commit_status_update() {
		tracing::debug!(object = %event.object_key(), "skipping commit status update event");
		return true;
	}
	false
}

/// Commit-status providers ignore reconciliations that are still running.
pub(crate) fn skip_for_commit_status(event: &Event) -> bool {
	if event.is_progressing() {
		tracing::debug!(object = %event.object_key(), "skipping progressing event");
		return true;
	}
	false
}
