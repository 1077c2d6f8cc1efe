use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::{AutoTurnConfig, AutoTurnController, AutoTurnSession, CancelToken, Clock, Locate, Outcome, Target, TurnInput};

struct Running {
	cancel: CancelToken,
	target: Target,
	handle: JoinHandle<()>,
}

impl Running {
	fn stop(self) {
		self.cancel.cancel();
		if self.handle.join().is_err() {
			tracing::warn!(goal = %self.target.label(), "auto-turn thread panicked");
		}
	}
}

/// Owns the single auto-turn worker thread.
///
/// Starting a session cancels and joins the previous one first, so two
/// sessions never overlap.
pub struct AutoTurnSupervisor {
	locator: Arc<dyn Locate>,
	input: Arc<dyn TurnInput>,
	clock: Arc<dyn Clock>,
	/// Serializes `start` calls; `active` is only locked briefly.
	starting: Mutex<()>,
	active: Mutex<Option<Running>>,
}

impl AutoTurnSupervisor {
	pub fn new(locator: Arc<dyn Locate>, input: Arc<dyn TurnInput>, clock: Arc<dyn Clock>) -> Self {
		Self {
			locator,
			input,
			clock,
			starting: Mutex::new(()),
			active: Mutex::new(None),
		}
	}

	/// Start guiding toward `target`. `on_done` runs on the worker thread once
	/// the session ends; it must not call back into the supervisor.
	pub fn start(
		&self,
		target: Target,
		config: AutoTurnConfig,
		on_done: impl FnOnce(&Target, Outcome) + Send + 'static,
	) -> std::io::Result<CancelToken> {
		let _starting = self.starting.lock().unwrap_or_else(PoisonError::into_inner);
		// Joined without holding `active`, so status queries don't wait on it.
		let previous = self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
		if let Some(prev) = previous {
			tracing::debug!(goal = %prev.target.label(), "superseding auto-turn session");
			prev.stop();
		}

		let mut session = AutoTurnSession::new(target.clone(), config.tolerance_deg, self.clock.now());
		let cancel = session.cancel_token();
		let locator = self.locator.clone();
		let input = self.input.clone();
		let clock = self.clock.clone();

		let handle = std::thread::Builder::new()
			.name("auto-turn".to_owned())
			.spawn(move || {
				let controller = AutoTurnController::new(config, &*locator, &*input, &*clock);
				let outcome = controller.run(&mut session);
				tracing::info!(goal = %session.target.label(), ?outcome, ticks = session.ticks, "auto-turn done");
				on_done(&session.target, outcome);
			})?;

		*self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(Running {
			cancel: cancel.clone(),
			target,
			handle,
		});
		Ok(cancel)
	}

	/// Cancel the running session, if any, and wait for it to wind down.
	pub fn cancel(&self) -> bool {
		let running = self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
		match running {
			Some(running) => {
				running.stop();
				true
			}
			None => false,
		}
	}

	pub fn is_active(&self) -> bool {
		self.active
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.is_some_and(|r| !r.handle.is_finished())
	}

	pub fn active_target(&self) -> Option<Target> {
		self.active
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.filter(|r| !r.handle.is_finished())
			.map(|r| r.target.clone())
	}

	/// Block until the current session (if any) ends on its own.
	pub fn wait(&self) {
		let running = self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
		if let Some(running) = running {
			if running.handle.join().is_err() {
				tracing::warn!("auto-turn thread panicked");
			}
		}
	}
}

impl Drop for AutoTurnSupervisor {
	fn drop(&mut self) {
		self.cancel();
	}
}
