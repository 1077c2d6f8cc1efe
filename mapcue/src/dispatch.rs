//! The action worker: turns hotkeys and button presses into locator passes,
//! announcements and auto-turn sessions, one command at a time.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use nav::{
	AutoTurnSupervisor, BearingResult, BearingStatus, DirectionalFeedbackRenderer, InputError, Locate, Locator,
	Outcome, Target, TurnInput,
};
use poi::{Catalog, Poi, PoiKind, PoiSet, PoiSources};

use crate::audio::Speaker;
use crate::config::SharedConfig;
use crate::hotkeys::Action;

pub enum Command {
	User(Action),
	Select(Target),
	AnnounceNearestPoi,
	/// Save a custom POI with this name at the player's position.
	AddPoi(String),
	ReloadConfig,
	/// Re-apply the configured map calibration.
	Recalibrate,
	ReloadPois,
	PoisLoaded(PoiSet),
	Finished(Target, Outcome),
}

/// Ordered list of selectable targets with a cursor that wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCursor {
	targets: Vec<Target>,
	index: usize,
}

impl TargetCursor {
	pub fn new(poi_names: impl IntoIterator<Item = String>) -> Self {
		let mut targets = vec![Target::PlacedMarker, Target::NearestObject];
		targets.extend(poi_names.into_iter().map(Target::Poi));
		Self { targets, index: 0 }
	}

	pub fn current(&self) -> &Target {
		&self.targets[self.index]
	}

	pub fn targets(&self) -> &[Target] {
		&self.targets
	}

	pub fn next(&mut self) -> &Target {
		self.index = (self.index + 1) % self.targets.len();
		self.current()
	}

	pub fn previous(&mut self) -> &Target {
		self.index = (self.index + self.targets.len() - 1) % self.targets.len();
		self.current()
	}

	/// Select `target`, adding it if it isn't listed.
	pub fn select(&mut self, target: Target) {
		match self.targets.iter().position(|t| *t == target) {
			Some(i) => self.index = i,
			None => {
				self.targets.push(target);
				self.index = self.targets.len() - 1;
			}
		}
	}

	/// Rebuild from new POI names, keeping the selection when it still exists.
	pub fn rebuild(&mut self, poi_names: impl IntoIterator<Item = String>) {
		let current = self.current().clone();
		*self = Self::new(poi_names);
		if let Some(i) = self.targets.iter().position(|t| *t == current) {
			self.index = i;
		}
	}
}

/// Target selection as shown in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
	pub target: Target,
	pub targets: Vec<Target>,
}

pub type SharedStatus = Arc<Mutex<Status>>;

/// Pause between the two halves of a camera recenter.
const RECENTER_PAUSE: Duration = Duration::from_millis(50);

/// Returns whether the command was delivered.
pub(crate) fn send_or_log(commands: &Sender<Command>, command: Command, what: &str) -> bool {
	let sent = commands.send(command).is_ok();
	if !sent {
		tracing::debug!("dispatcher is gone; {what} dropped");
	}
	sent
}

pub struct Dispatcher {
	config: SharedConfig,
	locator: Arc<Locator>,
	catalog: Arc<Catalog>,
	renderer: DirectionalFeedbackRenderer<Arc<Speaker>>,
	supervisor: Arc<AutoTurnSupervisor>,
	input: Arc<dyn TurnInput>,
	cursor: TargetCursor,
	poi_sources: PoiSources,
	status: SharedStatus,
	commands: Sender<Command>,
}

impl Dispatcher {
	pub fn new(
		config: SharedConfig,
		locator: Arc<Locator>,
		catalog: Arc<Catalog>,
		speaker: Arc<Speaker>,
		supervisor: Arc<AutoTurnSupervisor>,
		input: Arc<dyn TurnInput>,
		commands: Sender<Command>,
	) -> Self {
		let cfg = config.snapshot();
		let cursor = TargetCursor::new(catalog.snapshot().names());
		let status = Arc::new(Mutex::new(Status {
			target: cursor.current().clone(),
			targets: cursor.targets().to_vec(),
		}));
		Self {
			config,
			locator,
			catalog,
			renderer: DirectionalFeedbackRenderer::new(cfg.feedback, speaker),
			supervisor,
			input,
			cursor,
			poi_sources: cfg.pois,
			status,
			commands,
		}
	}

	pub fn status(&self) -> SharedStatus {
		self.status.clone()
	}

	pub fn spawn(mut self, commands: Receiver<Command>) -> std::io::Result<()> {
		std::thread::Builder::new().name("dispatch".to_owned()).spawn(move || {
			for command in commands {
				self.handle(command);
				self.publish();
			}
			tracing::debug!("dispatcher stopped");
		})?;
		Ok(())
	}

	fn publish(&self) {
		let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
		status.target = self.cursor.current().clone();
		status.targets = self.cursor.targets().to_vec();
	}

	fn handle(&mut self, command: Command) {
		match command {
			Command::User(action) => self.handle_action(action),
			Command::Select(target) => {
				self.cursor.select(target);
				self.announce_target();
			}
			Command::AnnounceNearestPoi => self.announce_nearest_poi(),
			Command::AddPoi(name) => self.add_poi(name),
			Command::ReloadConfig => self.reload_config(),
			Command::Recalibrate => self.recalibrate(),
			Command::ReloadPois => self.reload_pois(),
			Command::PoisLoaded(set) => {
				let count = set.len();
				self.catalog.replace(set);
				self.cursor.rebuild(self.catalog.snapshot().names());
				tracing::info!(count, "POI list updated");
			}
			Command::Finished(target, outcome) => {
				self.renderer.render_outcome(&target.label(), &outcome);
			}
		}
	}

	fn handle_action(&mut self, action: Action) {
		match action {
			Action::GetDirections => {
				let fix = self.locator.locate(self.cursor.current());
				self.renderer.render(&fix.target, &fix.result, fix.facing.unwrap_or(0.0));
			}
			Action::ToggleAutoTurn => {
				if self.supervisor.is_active() {
					self.supervisor.cancel();
				} else {
					self.start_auto_turn();
				}
			}
			Action::Cancel => {
				let was_active = self.supervisor.is_active();
				self.supervisor.cancel();
				if !was_active {
					self.renderer.say("Auto turn is not running");
				}
			}
			Action::AnnounceFacing => match self.locator.player() {
				Ok(player) => {
					self.renderer.render_facing(player.facing);
				}
				Err(err) => self.render_error("Player", &err),
			},
			Action::NextTarget => {
				self.cursor.next();
				self.announce_target();
			}
			Action::PreviousTarget => {
				self.cursor.previous();
				self.announce_target();
			}
			Action::DescribePosition => match self.locator.player_on_map() {
				Ok((u, v, facing)) => {
					self.renderer.render_position(u, v, facing);
				}
				Err(err) => self.render_error("Player", &err),
			},
			Action::Recenter => self.recenter(),
		}
	}

	/// Look down into the floor stop, then back up to level.
	fn recenter(&self) {
		if self.supervisor.cancel() {
			tracing::debug!("auto-turn cancelled for recenter");
		}
		let input = self.config.read().input;
		let moved = self.input.look(input.recenter_sweep_deg).and_then(|()| {
			std::thread::sleep(RECENTER_PAUSE);
			self.input.look(-input.recenter_back_deg)
		});
		match moved {
			Ok(()) => self.renderer.say("Camera reset"),
			Err(InputError::Unsupported) => self.renderer.say("Camera control is not supported here"),
			Err(err) => {
				tracing::warn!(error = %err, "recenter failed");
				self.renderer.say("Could not reset camera");
			}
		}
	}

	fn recalibrate(&self) {
		let calibration = self.config.read().map.calibration;
		match self.locator.calibrate(calibration) {
			Ok(()) => self.renderer.say("Map calibrated"),
			Err(err) => {
				tracing::warn!(error = %err, "calibration rejected");
				self.renderer.say("Calibration rejected, check the map settings");
			}
		}
	}

	fn render_error(&self, target: &str, err: &nav::NavError) {
		self.renderer
			.render(target, &BearingResult::invalid(BearingStatus::from(err)), 0.0);
	}

	fn announce_target(&self) {
		self.renderer.say(&format!("Target: {}", self.cursor.current().label()));
	}

	fn start_auto_turn(&self) {
		let target = self.cursor.current().clone();
		let config = self.config.read().auto_turn;
		let tx = self.commands.clone();
		let started = self.supervisor.start(target.clone(), config, move |target, outcome| {
			send_or_log(&tx, Command::Finished(target.clone(), outcome), "auto-turn outcome");
		});
		match started {
			Ok(_) => self.renderer.say(&format!("Turning toward {}", target.label())),
			Err(err) => {
				tracing::warn!(error = %err, "failed to start auto-turn");
				self.renderer.say("Could not start auto turn");
			}
		}
	}

	fn announce_nearest_poi(&self) {
		let position = match self.locator.player_position() {
			Ok(position) => position,
			Err(err) => return self.render_error("Player", &err),
		};
		let Some(nearest) = self.catalog.nearest(position) else {
			self.renderer.say("No POIs loaded");
			return;
		};
		let fix = self.locator.locate(&Target::Poi(nearest.name));
		self.renderer.render(&fix.target, &fix.result, fix.facing.unwrap_or(0.0));
	}

	fn add_poi(&mut self, name: String) {
		let name = name.trim().to_owned();
		if name.is_empty() {
			self.renderer.say("Enter a name first");
			return;
		}
		let position = match self.locator.player_position() {
			Ok(position) => position,
			Err(err) => return self.render_error("Player", &err),
		};
		let poi = Poi {
			map: self.poi_sources.map.clone(),
			..Poi::new(name.clone(), position, PoiKind::Custom)
		};
		if let Some(path) = &self.poi_sources.custom_file {
			if let Err(err) = poi::file::append_custom(path, &poi) {
				tracing::warn!("failed to save custom POI: {err:#}");
				self.renderer.say(&format!("Could not save {name}"));
				return;
			}
		}
		self.catalog.add(poi);
		self.cursor.rebuild(self.catalog.snapshot().names());
		self.cursor.select(Target::Poi(name.clone()));
		self.renderer.say(&format!("Saved {name}"));
	}

	fn reload_config(&mut self) {
		let cfg = self.config.snapshot();
		self.locator.reconfigure(cfg.map);
		self.renderer.set_config(cfg.feedback);
		if cfg.pois != self.poi_sources {
			self.poi_sources = cfg.pois;
			self.reload_pois();
		}
		tracing::info!("configuration applied");
	}

	/// Load off-thread; remote fetches may take a while.
	fn reload_pois(&self) {
		let sources = self.poi_sources.clone();
		let tx = self.commands.clone();
		let spawned = std::thread::Builder::new().name("poi-load".to_owned()).spawn(move || {
			send_or_log(&tx, Command::PoisLoaded(PoiSet::populated(&sources)), "POI list");
		});
		if let Err(err) = spawned {
			tracing::warn!(error = %err, "failed to start POI loader");
		}
	}
}
