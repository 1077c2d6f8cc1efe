//! Config hot-reload.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{Config, SharedConfig};
use crate::dispatch::{Command, send_or_log};

fn concerns(event: &notify::Event, path: &Path) -> bool {
	matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
		&& event.paths.iter().any(|p| p.file_name() == path.file_name())
}

/// Reload `path` into `shared` on every change and tell the dispatcher.
/// The watcher stops when the returned handle is dropped.
pub fn watch_config(path: PathBuf, shared: SharedConfig, commands: Sender<Command>) -> Result<RecommendedWatcher> {
	let dir = path
		.parent()
		.map(Path::to_path_buf)
		.context("config path has no parent directory")?;
	std::fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;

	let file = path.clone();
	let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
		let event = match res {
			Ok(event) => event,
			Err(err) => {
				tracing::warn!(error = %err, "config watch error");
				return;
			}
		};
		if !concerns(&event, &file) {
			return;
		}
		match Config::try_load_from(&file) {
			Ok(config) => {
				if shared.replace(config) {
					tracing::info!(path = ?file, "config reloaded");
					send_or_log(&commands, Command::ReloadConfig, "config reload");
				}
			}
			// Editors often write in several steps; the next event retries.
			Err(err) => tracing::debug!("config not reloaded: {err:#}"),
		}
	})
	.context("create config watcher")?;
	watcher
		.watch(&dir, RecursiveMode::NonRecursive)
		.with_context(|| format!("watch {:?}", dir))?;
	Ok(watcher)
}
