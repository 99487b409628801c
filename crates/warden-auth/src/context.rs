// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-call deadline and cancellation.
//!
//! Every store call made on behalf of a request runs through
//! [`RequestContext::run`], so an expired deadline or a cancelled caller stops
//! the work at the next store boundary instead of finishing a stale decision.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, Result};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	deadline: Option<Instant>,
	cancel: CancellationToken,
}

impl RequestContext {
	/// A context with no deadline that is never cancelled by itself.
	pub fn background() -> Self {
		Self::default()
	}

	pub fn with_deadline(deadline: Instant) -> Self {
		Self {
			deadline: Some(deadline),
			cancel: CancellationToken::new(),
		}
	}

	pub fn with_timeout(timeout: Duration) -> Self {
		Self::with_deadline(Instant::now() + timeout)
	}

	/// Attach a caller-owned cancellation token.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Tighten the deadline to at most `now + limit`.
	pub fn bounded_by(&self, limit: Duration) -> Self {
		let limit_at = Instant::now() + limit;
		let deadline = match self.deadline {
			Some(existing) if existing <= limit_at => existing,
			_ => limit_at,
		};
		Self {
			deadline: Some(deadline),
			cancel: self.cancel.clone(),
		}
	}

	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Fails with `DeadlineExceeded` if the context is already done.
	pub fn check(&self) -> Result<()> {
		if self.cancel.is_cancelled() {
			return Err(AuthError::DeadlineExceeded);
		}
		if let Some(deadline) = self.deadline {
			if Instant::now() >= deadline {
				return Err(AuthError::DeadlineExceeded);
			}
		}
		Ok(())
	}

	/// Run `fut`, aborting it if the deadline passes or the token is cancelled.
	pub async fn run<T, F>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		self.check()?;

		let guarded = async {
			match self.deadline {
				Some(deadline) => tokio::time::timeout_at(deadline, fut)
					.await
					.map_err(|_| AuthError::DeadlineExceeded)?,
				None => fut.await,
			}
		};

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(AuthError::DeadlineExceeded),
			result = guarded => result,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn background_context_runs_to_completion() {
		let ctx = RequestContext::background();
		let value = ctx.run(async { Ok(7) }).await.unwrap();
		assert_eq!(value, 7);
	}

	#[tokio::test]
	async fn errors_from_the_future_pass_through() {
		let ctx = RequestContext::background();
		let err = ctx
			.run(async { Err::<(), _>(AuthError::NotFound("g".into())) })
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::NotFound(_)));
	}

	#[tokio::test(start_paused = true)]
	async fn expired_deadline_fails_fast() {
		let ctx = RequestContext::with_timeout(Duration::from_millis(10));
		tokio::time::advance(Duration::from_millis(20)).await;

		assert!(matches!(ctx.check(), Err(AuthError::DeadlineExceeded)));
		let err = ctx.run(async { Ok(()) }).await.unwrap_err();
		assert!(matches!(err, AuthError::DeadlineExceeded));
	}

	#[tokio::test(start_paused = true)]
	async fn slow_future_is_cut_off() {
		let ctx = RequestContext::with_timeout(Duration::from_millis(50));
		let err = ctx
			.run(async {
				tokio::time::sleep(Duration::from_secs(5)).await;
				Ok(())
			})
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::DeadlineExceeded));
	}

	#[tokio::test]
	async fn cancellation_aborts() {
		let token = CancellationToken::new();
		let ctx = RequestContext::background().with_cancellation(token.clone());
		token.cancel();

		let err = ctx.run(async { Ok(()) }).await.unwrap_err();
		assert!(matches!(err, AuthError::DeadlineExceeded));
	}

	#[tokio::test(start_paused = true)]
	async fn bounded_by_keeps_earlier_deadline() {
		let ctx = RequestContext::with_timeout(Duration::from_millis(10));
		let bounded = ctx.bounded_by(Duration::from_secs(60));
		assert_eq!(bounded.deadline(), ctx.deadline());

		let open = RequestContext::background().bounded_by(Duration::from_millis(5));
		assert!(open.deadline().is_some());
	}
}
