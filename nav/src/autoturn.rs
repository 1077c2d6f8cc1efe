//! Closed-loop rotation toward a target.
//!
//! The controller is a plain state machine driven one tick at a time; it owns
//! no thread. [`AutoTurnSupervisor`](crate::AutoTurnSupervisor) runs it in the
//! background.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{BearingStatus, Clock, Fix, InputError, Locate, NavError, Target, TurnInput};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTurnConfig {
	/// Aligned when `|relative bearing| <= tolerance_deg`.
	pub tolerance_deg: f32,
	/// Fraction of the error corrected per tick.
	pub gain: f32,
	pub min_step_deg: f32,
	/// Upper bound on a single turn command.
	pub max_step_deg: f32,
	/// Consecutive invalid samples before giving up.
	pub miss_limit: u32,
	pub max_ticks: u32,
	pub max_duration_ms: u64,
	/// Wait after every command (and every miss) so the next capture sees its effect.
	pub settle_ms: u64,
}

impl Default for AutoTurnConfig {
	fn default() -> Self {
		Self {
			tolerance_deg: 10.0,
			gain: 0.8,
			min_step_deg: 1.0,
			max_step_deg: 45.0,
			miss_limit: 3,
			max_ticks: 20,
			max_duration_ms: 5000,
			settle_ms: 60,
		}
	}
}

impl AutoTurnConfig {
	/// Bounded proportional correction for a signed error.
	pub fn step_for(&self, error: f32) -> f32 {
		let max = self.max_step_deg.max(0.0);
		let magnitude = (error.abs() * self.gain).max(self.min_step_deg).min(max);
		magnitude.copysign(error)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
	Idle,
	Sampling,
	Correcting,
	Converged,
	TimedOut,
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutReason {
	/// Consecutive invalid samples (target, player or calibration missing).
	Misses,
	/// Consecutive samples where capture itself failed.
	Unavailable,
	Ticks,
	Duration,
}

impl fmt::Display for TimeoutReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Misses => "target lost",
			Self::Unavailable => "detection unavailable",
			Self::Ticks => "tick budget spent",
			Self::Duration => "time budget spent",
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	Converged { ticks: u32, error_deg: f32 },
	TimedOut(TimeoutReason),
	Cancelled,
	InputFailed(InputError),
}

impl Outcome {
	pub fn into_result(self) -> Result<u32, NavError> {
		match self {
			Self::Converged { ticks, .. } => Ok(ticks),
			Self::TimedOut(reason) => Err(NavError::ControlTimeout(reason)),
			Self::Cancelled => Err(NavError::ControlCancelled),
			Self::InputFailed(err) => Err(NavError::Input(err)),
		}
	}
}

/// Cooperative cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// State of one auto-turn request; written only by the controller.
#[derive(Debug)]
pub struct AutoTurnSession {
	pub target: Target,
	pub tolerance_deg: f32,
	pub ticks: u32,
	pub misses: u32,
	pub turns_issued: u32,
	pub state: TurnState,
	pub started: Instant,
	pub last: Option<Fix>,
	cancel: CancelToken,
}

impl AutoTurnSession {
	pub fn new(target: Target, tolerance_deg: f32, started: Instant) -> Self {
		Self {
			target,
			tolerance_deg,
			ticks: 0,
			misses: 0,
			turns_issued: 0,
			state: TurnState::Idle,
			started,
			last: None,
			cancel: CancelToken::new(),
		}
	}

	pub fn cancel_token(&self) -> CancelToken {
		self.cancel.clone()
	}
}

pub struct AutoTurnController<'a> {
	config: AutoTurnConfig,
	locator: &'a dyn Locate,
	input: &'a dyn TurnInput,
	clock: &'a dyn Clock,
}

impl<'a> AutoTurnController<'a> {
	pub fn new(config: AutoTurnConfig, locator: &'a dyn Locate, input: &'a dyn TurnInput, clock: &'a dyn Clock) -> Self {
		Self {
			config,
			locator,
			input,
			clock,
		}
	}

	pub fn session(&self, target: Target) -> AutoTurnSession {
		AutoTurnSession::new(target, self.config.tolerance_deg, self.clock.now())
	}

	fn settle(&self) {
		if self.config.settle_ms > 0 {
			self.clock.sleep(Duration::from_millis(self.config.settle_ms));
		}
	}

	fn finish(&self, session: &mut AutoTurnSession, state: TurnState, outcome: Outcome) -> Option<Outcome> {
		tracing::debug!(?state, ticks = session.ticks, turns = session.turns_issued, "auto-turn finished");
		session.state = state;
		Some(outcome)
	}

	/// Advance one control tick. Returns the outcome once the session ends.
	///
	/// Cancellation is only observed here, before any sampling, so a turn
	/// command is never interrupted halfway.
	pub fn tick(&self, session: &mut AutoTurnSession) -> Option<Outcome> {
		if session.cancel.is_cancelled() {
			return self.finish(session, TurnState::Cancelled, Outcome::Cancelled);
		}
		if session.ticks >= self.config.max_ticks {
			return self.finish(session, TurnState::TimedOut, Outcome::TimedOut(TimeoutReason::Ticks));
		}
		let elapsed = self.clock.now().saturating_duration_since(session.started);
		if elapsed >= Duration::from_millis(self.config.max_duration_ms) {
			return self.finish(session, TurnState::TimedOut, Outcome::TimedOut(TimeoutReason::Duration));
		}

		session.ticks += 1;
		session.state = TurnState::Sampling;
		let fix = self.locator.locate(&session.target);
		let error = fix.relative_bearing();
		let status = fix.result.status;
		session.last = Some(fix);

		let Some(error) = error else {
			session.misses += 1;
			tracing::debug!(?status, misses = session.misses, "auto-turn sample invalid");
			if session.misses >= self.config.miss_limit.max(1) {
				let reason = if status == BearingStatus::DetectionUnavailable {
					TimeoutReason::Unavailable
				} else {
					TimeoutReason::Misses
				};
				return self.finish(session, TurnState::TimedOut, Outcome::TimedOut(reason));
			}
			self.settle();
			return None;
		};
		session.misses = 0;

		if error.abs() <= session.tolerance_deg {
			return self.finish(
				session,
				TurnState::Converged,
				Outcome::Converged {
					ticks: session.ticks,
					error_deg: error,
				},
			);
		}

		session.state = TurnState::Correcting;
		let step = self.config.step_for(error);
		tracing::debug!(error, step, "auto-turn correcting");
		if let Err(err) = self.input.turn(step) {
			tracing::warn!(error = %err, "turn command rejected");
			return self.finish(session, TurnState::Cancelled, Outcome::InputFailed(err));
		}
		session.turns_issued += 1;
		self.settle();
		None
	}

	/// Tick until the session ends, then return it to `Idle`.
	pub fn run(&self, session: &mut AutoTurnSession) -> Outcome {
		let outcome = loop {
			if let Some(outcome) = self.tick(session) {
				break outcome;
			}
		};
		session.state = TurnState::Idle;
		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn steps_are_proportional_and_bounded() {
		let cfg = AutoTurnConfig {
			gain: 0.5,
			min_step_deg: 2.0,
			max_step_deg: 30.0,
			..Default::default()
		};
		assert_eq!(cfg.step_for(40.0), 20.0);
		assert_eq!(cfg.step_for(-40.0), -20.0);
		assert_eq!(cfg.step_for(170.0), 30.0);
		assert_eq!(cfg.step_for(-179.0), -30.0);
		assert_eq!(cfg.step_for(1.0), 2.0);
		assert_eq!(cfg.step_for(-1.0), -2.0);
	}

	#[test]
	fn outcomes_map_to_errors() {
		assert_eq!(Outcome::Converged { ticks: 3, error_deg: 1.0 }.into_result(), Ok(3));
		assert_eq!(
			Outcome::TimedOut(TimeoutReason::Misses).into_result(),
			Err(NavError::ControlTimeout(TimeoutReason::Misses))
		);
		assert_eq!(Outcome::Cancelled.into_result(), Err(NavError::ControlCancelled));
		assert_eq!(
			Outcome::InputFailed(InputError::Unsupported).into_result(),
			Err(NavError::Input(InputError::Unsupported))
		);
	}

	#[test]
	fn cancel_token_is_shared() {
		let session = AutoTurnSession::new(Target::PlacedMarker, 5.0, Instant::now());
		let token = session.cancel_token();
		assert!(!session.cancel.is_cancelled());
		token.cancel();
		assert!(session.cancel.is_cancelled());
	}
}
