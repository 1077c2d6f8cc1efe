//! Wires the engine together: capture → locator → dispatcher, plus the audio,
//! hotkey and config-watch threads.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use anyhow::{Context, Result};
use nav::{AutoTurnSupervisor, Locator, SystemClock};
use poi::{Catalog, PoiSet};
use vision::RetryingSource;

use crate::audio::{SpeechSink, Speaker, StatusLog, ToneSink};
use crate::capture::ScreenSource;
use crate::config::{Config, SharedConfig};
use crate::dispatch::{Command, Dispatcher, SharedStatus, send_or_log};
use crate::input::MouseInput;

/// Handles the window needs; dropping it stops the config watcher.
pub struct Runtime {
	pub config: SharedConfig,
	pub commands: Sender<Command>,
	pub status: SharedStatus,
	pub log: StatusLog,
	pub supervisor: Arc<AutoTurnSupervisor>,
	_watcher: Option<notify::RecommendedWatcher>,
}

impl Runtime {
	pub fn start() -> Result<Self> {
		let config = SharedConfig::new(Config::load_or_default());
		let cfg = config.snapshot();

		let screen = ScreenSource::new(Duration::from_millis(cfg.capture_reuse_ms));
		let source = Arc::new(RetryingSource::new(screen, cfg.capture_retry));
		let catalog = Arc::new(Catalog::new(PoiSet::default()));
		let locator = Arc::new(Locator::new(source, catalog.clone(), cfg.map.clone()));

		let log = StatusLog::default();
		let tones = ToneSink::spawn(config.clone())
			.map_err(|err| tracing::warn!(error = %err, "audio thread failed to start"))
			.ok();
		let speech = SpeechSink::spawn(config.clone())
			.map_err(|err| tracing::warn!(error = %err, "speech thread failed to start"))
			.ok();
		let speaker = Arc::new(Speaker::new(tones, speech, log.clone()));

		let input = Arc::new(MouseInput::new(config.clone()));
		let supervisor = Arc::new(AutoTurnSupervisor::new(locator.clone(), input.clone(), Arc::new(SystemClock)));

		let (tx, rx) = mpsc::channel();
		let dispatcher = Dispatcher::new(
			config.clone(),
			locator,
			catalog,
			speaker,
			supervisor.clone(),
			input,
			tx.clone(),
		);
		let status = dispatcher.status();
		dispatcher.spawn(rx).context("spawn dispatcher")?;
		send_or_log(&tx, Command::ReloadPois, "initial POI load");

		if let Err(err) = crate::hotkeys::spawn_listener(config.clone(), tx.clone()) {
			tracing::warn!(error = %err, "hotkey thread failed to start");
		}

		let watcher = Config::path()
			.and_then(|path| crate::watch::watch_config(path, config.clone(), tx.clone()))
			.map_err(|err| tracing::warn!("config hot-reload disabled: {err:#}"))
			.ok();

		tracing::info!("mapcue ready");
		Ok(Self {
			config,
			commands: tx,
			status,
			log,
			supervisor,
			_watcher: watcher,
		})
	}

	pub fn send(&self, command: Command) {
		if self.commands.send(command).is_err() {
			tracing::warn!("dispatcher is gone");
		}
	}
}
