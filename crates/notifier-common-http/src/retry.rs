// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry logic with exponential backoff for outbound deliveries.

use std::env;
use std::time::Duration;

use notifier_core::{Cancelled, Context};
use reqwest::StatusCode;
use tracing::{debug, warn};

const ENV_MAX_ATTEMPTS: &str = "NOTIFIER_HTTP_MAX_ATTEMPTS";

#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 4,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(10),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Defaults, with `NOTIFIER_HTTP_MAX_ATTEMPTS` applied when it parses
	/// to a positive integer.
	pub fn from_env() -> Self {
		let mut cfg = Self::default();
		if let Ok(raw) = env::var(ENV_MAX_ATTEMPTS) {
			match raw.parse::<u32>() {
				Ok(n) if n > 0 => cfg.max_attempts = n,
				_ => warn!(value = %raw, "ignoring invalid {ENV_MAX_ATTEMPTS}"),
			}
		}
		cfg
	}

	/// A configuration that performs exactly one attempt.
	pub fn no_retry() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() || self.is_request() {
			return true;
		}

		if let Some(status) = self.status() {
			return status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
		}

		false
	}
}

fn calculate_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
	let max_delay = cfg.max_delay.as_secs_f64();
	let exponential_delay = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped_delay = exponential_delay.min(max_delay);

	let jittered_delay = if cfg.jitter {
		let jitter_factor = 0.5 + fastrand::f64();
		capped_delay * jitter_factor
	} else {
		capped_delay
	};

	// max_delay bounds the jittered value too
	Duration::from_secs_f64(jittered_delay.min(max_delay))
}

/// Run `f` until it succeeds, fails permanently, exhausts
/// `cfg.max_attempts`, or `ctx` is done.
///
/// Backoff sleeps are cancellable: if `ctx` is cancelled or its deadline
/// passes while waiting, the cancellation cause is returned instead of the
/// last attempt's error.
pub async fn retry<F, Fut, T, E>(ctx: &Context, cfg: &RetryConfig, mut f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, E>>,
	E: RetryableError + From<Cancelled> + std::fmt::Display,
{
	let max_attempts = cfg.max_attempts.max(1);
	let mut attempt = 0;

	loop {
		match f().await {
			Ok(result) => return Ok(result),
			Err(err) => {
				attempt += 1;

				if !err.is_retryable() {
					debug!(error = %err, attempt, "non-retryable error encountered");
					return Err(err);
				}

				if attempt >= max_attempts {
					warn!(
						error = %err,
						attempt,
						max_attempts,
						"max retry attempts exhausted"
					);
					return Err(err);
				}

				let delay = calculate_delay(cfg, attempt - 1);
				warn!(
					error = %err,
					attempt,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					"retrying after error"
				);

				ctx.sleep(delay).await.map_err(E::from)?;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	enum MockError {
		Attempt { retryable: bool },
		Cancelled(Cancelled),
	}

	impl std::fmt::Display for MockError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "{self:?}")
		}
	}

	impl From<Cancelled> for MockError {
		fn from(c: Cancelled) -> Self {
			MockError::Cancelled(c)
		}
	}

	impl RetryableError for MockError {
		fn is_retryable(&self) -> bool {
			matches!(self, MockError::Attempt { retryable: true })
		}
	}

	fn fast_config(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(10),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	#[tokio::test]
	async fn non_retryable_error_fails_immediately() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let result: Result<(), MockError> = retry(&Context::background(), &fast_config(4), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(MockError::Attempt { retryable: false })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn retryable_error_retries_up_to_max_attempts() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let result: Result<(), MockError> = retry(&Context::background(), &fast_config(4), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(MockError::Attempt { retryable: true })
			}
		})
		.await;

		assert!(matches!(result, Err(MockError::Attempt { .. })));
		assert_eq!(attempts.load(Ordering::SeqCst), 4);
	}

	#[tokio::test]
	async fn succeeds_after_transient_failures() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let result: Result<&str, MockError> = retry(&Context::background(), &fast_config(5), || {
			let counter = Arc::clone(&counter);
			async move {
				if counter.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(MockError::Attempt { retryable: true })
				} else {
					Ok("delivered")
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), "delivered");
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_during_backoff_returns_cancellation_cause() {
		let ctx = Context::background();
		let canceller = ctx.clone();
		let cfg = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(60),
			max_delay: Duration::from_secs(60),
			backoff_factor: 1.0,
			jitter: false,
		};

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(5)).await;
			canceller.cancel();
		});

		let result: Result<(), MockError> = retry(&ctx, &cfg, || async {
			Err(MockError::Attempt { retryable: true })
		})
		.await;

		assert!(matches!(
			result,
			Err(MockError::Cancelled(Cancelled::Canceled))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_during_backoff_returns_deadline_exceeded() {
		let ctx = Context::background().with_timeout(Duration::from_secs(1));
		let cfg = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(30),
			max_delay: Duration::from_secs(30),
			backoff_factor: 1.0,
			jitter: false,
		};

		let result: Result<(), MockError> = retry(&ctx, &cfg, || async {
			Err(MockError::Attempt { retryable: true })
		})
		.await;

		assert!(matches!(
			result,
			Err(MockError::Cancelled(Cancelled::DeadlineExceeded))
		));
	}

	#[test]
	fn jitter_adds_randomness() {
		let with_jitter = RetryConfig {
			max_attempts: 3,
			base_delay: Duration::from_millis(100),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		};
		let without_jitter = RetryConfig {
			jitter: false,
			..with_jitter.clone()
		};

		let fixed: Vec<Duration> = (0..10).map(|_| calculate_delay(&without_jitter, 1)).collect();
		let jittered: Vec<Duration> = (0..10).map(|_| calculate_delay(&with_jitter, 1)).collect();

		assert!(fixed.windows(2).all(|w| w[0] == w[1]));
		assert!(!jittered.windows(2).all(|w| w[0] == w[1]));
	}

	#[test]
	fn delay_respects_max_delay() {
		let cfg = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(5),
			backoff_factor: 10.0,
			jitter: false,
		};

		for attempt in 0..10 {
			assert!(calculate_delay(&cfg, attempt) <= Duration::from_secs(5));
		}
	}

	#[test]
	fn jittered_delay_respects_max_delay() {
		let cfg = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(5),
			backoff_factor: 10.0,
			jitter: true,
		};

		for attempt in 0..10 {
			for _ in 0..50 {
				assert!(calculate_delay(&cfg, attempt) <= Duration::from_secs(5));
			}
		}
		// Below the cap jitter still spreads delays upward.
		let low = RetryConfig {
			max_delay: Duration::from_secs(60),
			..cfg
		};
		assert!((0..200).any(|_| calculate_delay(&low, 0) > Duration::from_secs(1)));
	}

	#[test]
	fn default_attempt_budget_is_four() {
		assert_eq!(RetryConfig::default().max_attempts, 4);
		assert_eq!(RetryConfig::no_retry().max_attempts, 1);
	}
}
