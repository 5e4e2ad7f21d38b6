// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Process-wide token cache with single-flight fetches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use notifier_core::Context;
use tracing::{debug, info, instrument, trace};

use crate::error::AuthError;
use crate::source::Token;

/// Tokens this close to expiry are treated as expired.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 30;

/// The only operation notifiers cache tokens for.
pub const OPERATION_POST: &str = "post";

/// Cache key: the provider object a token was fetched for and the operation
/// it will be used for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvolvedObject {
	pub kind: String,
	pub name: String,
	pub namespace: String,
	pub operation: String,
}

impl InvolvedObject {
	pub fn post(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			name: name.into(),
			namespace: namespace.into(),
			operation: OPERATION_POST.to_string(),
		}
	}
}

type SharedFetch = Shared<BoxFuture<'static, Result<Token, AuthError>>>;
type Slots = Arc<Mutex<HashMap<InvolvedObject, Slot>>>;

/// Upper bound on one fetch, independent of whoever is waiting for it.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

enum Slot {
	Ready(Token),
	Pending { id: u64, fetch: SharedFetch },
}

/// Token cache keyed by [`InvolvedObject`].
///
/// Concurrent misses for one key share a single fetch, and a failed fetch
/// is reported to every caller that waited on it. Tokens without an expiry
/// are never stored.
///
/// A fetch runs on its own task under a detached [`Context`] bounded by
/// [`FETCH_TIMEOUT`], and settles its slot when it finishes whether or not
/// anyone is still waiting. Cancelling one caller never fails another.
#[derive(Default)]
pub struct TokenCache {
	slots: Slots,
	next_id: AtomicU64,
}

impl std::fmt::Debug for TokenCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenCache")
			.field("entries", &self.len())
			.finish()
	}
}

fn is_fresh(token: &Token) -> bool {
	match token.expires_at() {
		Some(expires_at) => Utc::now() + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < expires_at,
		None => false,
	}
}

fn lock(slots: &Mutex<HashMap<InvolvedObject, Slot>>) -> MutexGuard<'_, HashMap<InvolvedObject, Slot>> {
	slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store the outcome of fetch `id`, unless the slot was invalidated or
/// replaced while it ran.
fn settle(slots: &Mutex<HashMap<InvolvedObject, Slot>>, key: &InvolvedObject, id: u64, result: &Result<Token, AuthError>) {
	let mut slots = lock(slots);
	if !matches!(slots.get(key), Some(Slot::Pending { id: current, .. }) if *current == id) {
		return;
	}
	match result {
		Ok(token) if is_fresh(token) => {
			info!(kind = %key.kind, name = %key.name, namespace = %key.namespace, "token refreshed");
			slots.insert(key.clone(), Slot::Ready(token.clone()));
		}
		_ => {
			slots.remove(key);
		}
	}
}

impl TokenCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// The shared instance used when no cache is injected.
	pub fn global() -> Arc<TokenCache> {
		static GLOBAL: OnceLock<Arc<TokenCache>> = OnceLock::new();
		Arc::clone(GLOBAL.get_or_init(|| Arc::new(TokenCache::new())))
	}

	fn slots(&self) -> MutexGuard<'_, HashMap<InvolvedObject, Slot>> {
		lock(&self.slots)
	}

	/// Return the cached token for `key`, or run `fetch` to obtain one.
	///
	/// Only one `fetch` runs per key at a time; other callers await its
	/// result. `fetch` receives the fetch's own context, not `ctx`: waiting
	/// honors `ctx`, the fetch itself does not.
	#[instrument(skip(self, ctx, fetch), fields(kind = %key.kind, name = %key.name, namespace = %key.namespace))]
	pub async fn get_or_fetch<F, Fut>(
		&self,
		ctx: &Context,
		key: &InvolvedObject,
		fetch: F,
	) -> Result<Token, AuthError>
	where
		F: FnOnce(Context) -> Fut,
		Fut: Future<Output = Result<Token, AuthError>> + Send + 'static,
	{
		let pending = {
			let mut slots = self.slots();
			match slots.get(key) {
				Some(Slot::Ready(token)) if is_fresh(token) => {
					trace!("using cached token");
					return Ok(token.clone());
				}
				Some(Slot::Pending { fetch: in_flight, .. }) => {
					trace!("joining in-flight token fetch");
					in_flight.clone()
				}
				_ => {
					debug!("fetching new token");
					let id = self.next_id.fetch_add(1, Ordering::Relaxed);
					let fetch_ctx = Context::background().with_timeout(FETCH_TIMEOUT);
					let fut = fetch(fetch_ctx.clone());
					let task_slots = Arc::clone(&self.slots);
					let task_key = key.clone();
					let handle = tokio::spawn(async move {
						let result = match fetch_ctx.run(fut).await {
							Ok(result) => result,
							Err(cancelled) => Err(AuthError::Cancelled(cancelled)),
						};
						settle(&task_slots, &task_key, id, &result);
						result
					});
					let shared = async move {
						handle.await.unwrap_or_else(|e| {
							Err(AuthError::Source {
								message: format!("token fetch task failed: {e}"),
								retryable: true,
							})
						})
					}
					.boxed()
					.shared();
					slots.insert(key.clone(), Slot::Pending { id, fetch: shared.clone() });
					shared
				}
			}
		};

		ctx.run(pending).await?
	}

	/// Drop the entry for `key` so the next lookup fetches again.
	pub fn invalidate(&self, key: &InvolvedObject) {
		if self.slots().remove(key).is_some() {
			info!(kind = %key.kind, name = %key.name, namespace = %key.namespace, "invalidated cached token");
		}
	}

	/// Number of keys with a cached or in-flight token.
	pub fn len(&self) -> usize {
		self.slots().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
