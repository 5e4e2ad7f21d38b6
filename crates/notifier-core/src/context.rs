// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cancellation and deadline propagation for a single delivery.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] stopped a suspended operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
	#[error("context canceled")]
	Canceled,

	#[error("context deadline exceeded")]
	DeadlineExceeded,
}

/// Carries cancellation and an optional deadline through every await point
/// of a delivery.
///
/// Clones share the same cancellation state. Derived contexts
/// ([`Context::with_timeout`], [`Context::child`]) are cancelled with their
/// parent but can be cancelled independently.
#[derive(Debug, Clone, Default)]
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
}

impl Context {
	/// A context that is never cancelled and has no deadline.
	pub fn background() -> Self {
		Self::default()
	}

	/// Derive a context that can be cancelled without affecting this one.
	pub fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
			deadline: self.deadline,
		}
	}

	/// Derive a context that expires after `timeout`, or at the parent's
	/// deadline if that is sooner.
	pub fn with_timeout(&self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(&self, deadline: Instant) -> Self {
		let deadline = match self.deadline {
			Some(parent) if parent < deadline => parent,
			_ => deadline,
		};
		Self {
			token: self.token.child_token(),
			deadline: Some(deadline),
		}
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Time left before the deadline, if one is set.
	pub fn remaining(&self) -> Option<Duration> {
		self
			.deadline
			.map(|d| d.saturating_duration_since(Instant::now()))
	}

	/// The reason this context is done, or `None` while it is live.
	pub fn err(&self) -> Option<Cancelled> {
		if self.token.is_cancelled() {
			return Some(Cancelled::Canceled);
		}
		match self.deadline {
			Some(d) if Instant::now() >= d => Some(Cancelled::DeadlineExceeded),
			_ => None,
		}
	}

	/// Drive `fut` to completion unless the context is cancelled or its
	/// deadline passes first.
	pub async fn run<F>(&self, fut: F) -> Result<F::Output, Cancelled>
	where
		F: Future,
	{
		if let Some(reason) = self.err() {
			return Err(reason);
		}

		let deadline = async {
			match self.deadline {
				Some(d) => tokio::time::sleep_until(d).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.token.cancelled() => Err(Cancelled::Canceled),
			_ = deadline => Err(Cancelled::DeadlineExceeded),
			out = fut => Ok(out),
		}
	}

	/// Sleep for `duration` unless cancelled first.
	pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
		self.run(tokio::time::sleep(duration)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn background_runs_to_completion() {
		let ctx = Context::background();
		assert_eq!(ctx.run(async { 42 }).await, Ok(42));
		assert!(ctx.err().is_none());
		assert!(ctx.remaining().is_none());
	}

	#[tokio::test]
	async fn cancel_interrupts_sleep() {
		let ctx = Context::background();
		let canceller = ctx.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			canceller.cancel();
		});
		let result = ctx.sleep(Duration::from_secs(30)).await;
		assert_eq!(result, Err(Cancelled::Canceled));
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_interrupts_sleep() {
		let ctx = Context::background().with_timeout(Duration::from_millis(50));
		let result = ctx.sleep(Duration::from_secs(30)).await;
		assert_eq!(result, Err(Cancelled::DeadlineExceeded));
		assert_eq!(ctx.err(), Some(Cancelled::DeadlineExceeded));
	}

	#[tokio::test]
	async fn parent_cancel_propagates_to_child() {
		let parent = Context::background();
		let child = parent.child();
		parent.cancel();
		assert_eq!(child.err(), Some(Cancelled::Canceled));
	}

	#[tokio::test]
	async fn child_cancel_does_not_reach_parent() {
		let parent = Context::background();
		let child = parent.child();
		child.cancel();
		assert!(parent.err().is_none());
	}

	#[tokio::test]
	async fn child_deadline_never_exceeds_parent() {
		let parent = Context::background().with_timeout(Duration::from_secs(1));
		let child = parent.with_timeout(Duration::from_secs(60));
		assert_eq!(child.deadline(), parent.deadline());
	}
}
