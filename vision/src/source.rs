use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Frame, ScreenRect};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
	#[error("capture region {0:?} is empty or outside the active display")]
	OffScreen(ScreenRect),
	#[error("display unavailable: {0}")]
	DisplayUnavailable(String),
	#[error("capture backend failed: {0}")]
	Backend(String),
}

impl CaptureError {
	/// Off-screen regions are a configuration problem; retrying won't help.
	pub fn is_transient(&self) -> bool {
		!matches!(self, Self::OffScreen(_))
	}
}

/// Captures a screen rectangle on demand. Every call re-captures.
pub trait FrameSource: Send + Sync {
	fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for std::sync::Arc<T> {
	fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError> {
		(**self).capture(region)
	}
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
	fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError> {
		(**self).capture(region)
	}
}

/// Bounded retry: at most `max_attempts` tries, `backoff_ms` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub backoff_ms: u64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff_ms: 30,
		}
	}
}

impl RetryPolicy {
	/// Run `op` until it succeeds, fails with a non-retryable error, or the
	/// attempt budget is spent. `op` receives the 1-based attempt number.
	pub fn run<T, E>(
		&self,
		mut op: impl FnMut(u32) -> Result<T, E>,
		retryable: impl Fn(&E) -> bool,
		sleep: impl Fn(Duration),
	) -> Result<T, E> {
		let attempts = self.max_attempts.max(1);
		let mut attempt = 1;
		loop {
			match op(attempt) {
				Ok(v) => return Ok(v),
				Err(err) if attempt < attempts && retryable(&err) => {
					attempt += 1;
					if self.backoff_ms > 0 {
						sleep(Duration::from_millis(self.backoff_ms));
					}
				}
				Err(err) => return Err(err),
			}
		}
	}
}

/// Wraps a [`FrameSource`] with a [`RetryPolicy`] for transient failures.
pub struct RetryingSource<S> {
	inner: S,
	policy: RetryPolicy,
}

impl<S: FrameSource> RetryingSource<S> {
	pub fn new(inner: S, policy: RetryPolicy) -> Self {
		Self { inner, policy }
	}
}

impl<S: FrameSource> FrameSource for RetryingSource<S> {
	fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError> {
		self.policy.run(
			|attempt| {
				let res = self.inner.capture(region);
				if let Err(err) = &res {
					tracing::debug!(attempt, error = %err, "capture failed");
				}
				res
			},
			CaptureError::is_transient,
			std::thread::sleep,
		)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;
	use std::sync::Mutex;
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;
	use crate::Color;

	struct Scripted {
		script: Mutex<VecDeque<Result<(), CaptureError>>>,
		calls: AtomicU32,
	}

	impl Scripted {
		fn new(script: Vec<Result<(), CaptureError>>) -> Self {
			Self {
				script: Mutex::new(script.into()),
				calls: AtomicU32::new(0),
			}
		}
	}

	impl FrameSource for Scripted {
		fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
			next.map(|_| Frame::from_fn(region, |_, _| Color::BLACK))
		}
	}

	fn policy(max_attempts: u32) -> RetryPolicy {
		RetryPolicy {
			max_attempts,
			backoff_ms: 0,
		}
	}

	#[test]
	fn transient_failures_are_retried() {
		let src = RetryingSource::new(
			Scripted::new(vec![
				Err(CaptureError::Backend("busy".into())),
				Err(CaptureError::DisplayUnavailable("locked".into())),
			]),
			policy(3),
		);
		assert!(src.capture(ScreenRect::new(0, 0, 4, 4)).is_ok());
		assert_eq!(src.inner.calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn attempts_are_bounded() {
		let src = RetryingSource::new(
			Scripted::new(vec![Err(CaptureError::Backend("x".into())); 10]),
			policy(4),
		);
		let err = src.capture(ScreenRect::new(0, 0, 4, 4)).unwrap_err();
		assert_eq!(err, CaptureError::Backend("x".into()));
		assert_eq!(src.inner.calls.load(Ordering::SeqCst), 4);
	}

	#[test]
	fn off_screen_is_not_retried() {
		let rect = ScreenRect::new(5000, 0, 4, 4);
		let src = RetryingSource::new(Scripted::new(vec![Err(CaptureError::OffScreen(rect))]), policy(5));
		assert_eq!(src.capture(rect).unwrap_err(), CaptureError::OffScreen(rect));
		assert_eq!(src.inner.calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn backoff_sleeps_between_attempts_only() {
		let slept = std::cell::Cell::new(0u32);
		let policy = RetryPolicy {
			max_attempts: 3,
			backoff_ms: 10,
		};
		let res: Result<(), &str> = policy.run(|_| Err("nope"), |_| true, |d| {
			assert_eq!(d, Duration::from_millis(10));
			slept.set(slept.get() + 1);
		});
		assert!(res.is_err());
		assert_eq!(slept.get(), 2);
	}
}
