//! Global hotkeys via `rdev`, delivered as [`Action`]s.

use std::sync::mpsc::Sender;

use rdev::{EventType, Key};

use crate::config::{Hotkeys, SharedConfig};
use crate::dispatch::Command;

/// Something the user asked for, from a hotkey or a window button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	GetDirections,
	ToggleAutoTurn,
	Cancel,
	AnnounceFacing,
	NextTarget,
	PreviousTarget,
	DescribePosition,
	Recenter,
}

impl Hotkeys {
	pub fn action_for(&self, key: Key) -> Option<Action> {
		[
			(self.get_directions, Action::GetDirections),
			(self.toggle_auto_turn, Action::ToggleAutoTurn),
			(self.cancel, Action::Cancel),
			(self.announce_facing, Action::AnnounceFacing),
			(self.next_target, Action::NextTarget),
			(self.previous_target, Action::PreviousTarget),
			(self.describe_position, Action::DescribePosition),
			(self.recenter, Action::Recenter),
		]
		.into_iter()
		.find(|(k, _)| *k == key)
		.map(|(_, action)| action)
	}
}

/// Listen for key presses on a background thread for the rest of the process.
pub fn spawn_listener(config: SharedConfig, commands: Sender<Command>) -> std::io::Result<()> {
	std::thread::Builder::new().name("hotkeys".to_owned()).spawn(move || {
		let result = rdev::listen(move |event| {
			let EventType::KeyPress(key) = event.event_type else {
				return;
			};
			let action = config.read().hotkeys.action_for(key);
			if let Some(action) = action {
				tracing::debug!(?key, ?action, "hotkey");
				if commands.send(Command::User(action)).is_err() {
					tracing::debug!(?action, "dispatcher is gone; hotkey ignored");
				}
			}
		});
		if let Err(err) = result {
			tracing::warn!(error = ?err, "global hotkeys unavailable; use the window buttons");
		}
	})?;
	Ok(())
}
