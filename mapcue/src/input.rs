//! Turning the in-game camera with relative mouse moves.

use std::time::Duration;

use nav::{InputError, TurnInput};

use crate::config::{InputConfig, SharedConfig};

/// Split `total` counts into `steps` near-equal moves that sum to `total`.
pub fn split_counts(total: i32, steps: u32) -> Vec<i32> {
	let steps = steps.max(1) as i32;
	let (base, rem) = (total / steps, total % steps);
	(0..steps)
		.map(|i| base + if i < rem.abs() { rem.signum() } else { 0 })
		.filter(|&c| c != 0)
		.collect()
}

fn to_counts(delta_degrees: f32, config: &InputConfig) -> Result<i32, InputError> {
	let counts = (delta_degrees * config.counts_per_degree).round();
	if !counts.is_finite() || counts.abs() > i32::MAX as f32 {
		return Err(InputError::Rejected(format!("turn of {delta_degrees} degrees is out of range")));
	}
	Ok(counts as i32)
}

/// Sends relative mouse moves, reading its parameters from the live config.
pub struct MouseInput {
	config: SharedConfig,
}

impl MouseInput {
	pub fn new(config: SharedConfig) -> Self {
		Self { config }
	}

	fn smooth_move(&self, dx: i32, dy: i32) -> Result<(), InputError> {
		let config = self.config.read().input;
		let delay = Duration::from_millis(config.step_delay_ms);
		let xs = split_counts(dx, config.steps);
		let ys = split_counts(dy, config.steps);
		let n = xs.len().max(ys.len());
		for i in 0..n {
			let step_x = xs.get(i).copied().unwrap_or(0);
			let step_y = ys.get(i).copied().unwrap_or(0);
			platform::move_relative(step_x, step_y)?;
			if i + 1 < n && !delay.is_zero() {
				std::thread::sleep(delay);
			}
		}
		Ok(())
	}
}

impl TurnInput for MouseInput {
	fn turn(&self, delta_degrees: f32) -> Result<(), InputError> {
		let counts = to_counts(delta_degrees, &self.config.read().input)?;
		tracing::debug!(delta_degrees, counts, "turn");
		self.smooth_move(counts, 0)
	}

	fn look(&self, delta_degrees: f32) -> Result<(), InputError> {
		let config = self.config.read().input;
		let counts = to_counts(delta_degrees, &config)?;
		let counts = if config.invert_y { -counts } else { counts };
		tracing::debug!(delta_degrees, counts, "look");
		self.smooth_move(0, counts)
	}
}

#[cfg(windows)]
mod platform {
	use nav::InputError;
	use windows::Win32::UI::Input::KeyboardAndMouse::{
		INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_MOVE, MOUSEINPUT, SendInput,
	};

	pub fn move_relative(dx: i32, dy: i32) -> Result<(), InputError> {
		let input = INPUT {
			r#type: INPUT_MOUSE,
			Anonymous: INPUT_0 {
				mi: MOUSEINPUT {
					dx,
					dy,
					mouseData: 0,
					dwFlags: MOUSEEVENTF_MOVE,
					time: 0,
					dwExtraInfo: 0,
				},
			},
		};
		// SAFETY: `input` is a fully initialized MOUSEINPUT and the size matches.
		let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
		if sent == 1 {
			Ok(())
		} else {
			Err(InputError::Rejected(format!(
				"SendInput: {}",
				windows::core::Error::from_win32().message()
			)))
		}
	}
}

#[cfg(not(windows))]
mod platform {
	use nav::InputError;

	pub fn move_relative(dx: i32, dy: i32) -> Result<(), InputError> {
		tracing::warn!(dx, dy, "relative mouse input is only implemented on Windows");
		Err(InputError::Unsupported)
	}
}
