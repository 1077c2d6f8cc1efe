//! Boundaries to the outside world: speech/audio, simulated input, POI
//! lookup and time.

use std::time::{Duration, Instant};

use crate::{Feedback, MapSpacePoint};

/// Receives rendered feedback. Implementations must not block on playback.
pub trait Announce: Send + Sync {
	fn announce(&self, feedback: &Feedback);
}

impl<T: Announce + ?Sized> Announce for std::sync::Arc<T> {
	fn announce(&self, feedback: &Feedback) {
		(**self).announce(feedback)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
	#[error("simulated input is not supported on this platform")]
	Unsupported,
	#[error("input rejected: {0}")]
	Rejected(String),
}

/// Accepts relative view rotations. Only bounded deltas are ever sent.
pub trait TurnInput: Send + Sync {
	/// Rotate the view horizontally; positive = clockwise (right).
	fn turn(&self, delta_degrees: f32) -> Result<(), InputError>;

	/// Tilt the view vertically; positive = down.
	fn look(&self, delta_degrees: f32) -> Result<(), InputError>;
}

/// A named map-space position supplied by a POI provider.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPoint {
	pub name: String,
	pub point: MapSpacePoint,
}

pub trait TargetProvider: Send + Sync {
	fn get_target(&self, name: &str) -> Option<NamedPoint>;
}

pub trait Clock: Send + Sync {
	fn now(&self) -> Instant;
	fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}

	fn sleep(&self, duration: Duration) {
		std::thread::sleep(duration)
	}
}
