use std::sync::PoisonError;
use std::time::Duration;

mod settings;

use crate::dispatch::Command;
use crate::hotkeys::Action;
use crate::runtime::Runtime;

pub struct MapCue {
	runtime: Runtime,
	tab: Tab,
	new_poi_name: String,
}

impl MapCue {
	pub fn new(_cc: &eframe::CreationContext<'_>, runtime: Runtime) -> Self {
		Self {
			runtime,
			tab: Tab::Home,
			new_poi_name: String::new(),
		}
	}

	fn action_button(&self, ui: &mut egui::Ui, label: &str, action: Action) {
		if ui.button(label).clicked() {
			self.runtime.send(Command::User(action));
		}
	}

	fn ui_home(&mut self, ui: &mut egui::Ui) {
		let status = self
			.runtime
			.status
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		let hotkeys = self.runtime.config.read().hotkeys;

		ui.horizontal(|ui| {
			ui.label("Target:");
			let mut selected = status.target.clone();
			egui::ComboBox::from_id_salt("target")
				.selected_text(selected.label())
				.show_ui(ui, |ui| {
					for target in &status.targets {
						ui.selectable_value(&mut selected, target.clone(), target.label());
					}
				});
			if selected != status.target {
				self.runtime.send(Command::Select(selected));
			}
		});

		ui.horizontal_wrapped(|ui| {
			self.action_button(ui, &format!("Get directions ({:?})", hotkeys.get_directions), Action::GetDirections);
			self.action_button(ui, &format!("Announce facing ({:?})", hotkeys.announce_facing), Action::AnnounceFacing);
			self.action_button(ui, &format!("Previous target ({:?})", hotkeys.previous_target), Action::PreviousTarget);
			self.action_button(ui, &format!("Next target ({:?})", hotkeys.next_target), Action::NextTarget);
			self.action_button(ui, &format!("Where am I ({:?})", hotkeys.describe_position), Action::DescribePosition);
			self.action_button(ui, &format!("Reset camera ({:?})", hotkeys.recenter), Action::Recenter);
		});

		ui.horizontal(|ui| match self.runtime.supervisor.active_target() {
			Some(target) => {
				ui.label(format!("Auto turn: turning toward {}", target.label()));
				self.action_button(ui, &format!("Cancel ({:?})", hotkeys.cancel), Action::Cancel);
			}
			None => {
				ui.label("Auto turn: idle");
				self.action_button(ui, &format!("Start auto turn ({:?})", hotkeys.toggle_auto_turn), Action::ToggleAutoTurn);
			}
		});

		ui.separator();
		ui.horizontal(|ui| {
			if ui.button("Nearest POI").clicked() {
				self.runtime.send(Command::AnnounceNearestPoi);
			}
			ui.text_edit_singleline(&mut self.new_poi_name)
				.on_hover_text("Name for a custom POI at your current position");
			if ui.button("Save POI here").clicked() {
				self.runtime.send(Command::AddPoi(std::mem::take(&mut self.new_poi_name)));
			}
			if ui.button("Reload POIs").clicked() {
				self.runtime.send(Command::ReloadPois);
			}
		});

		ui.separator();
		if let Some(last) = self.runtime.log.last() {
			ui.heading(last);
		}
		egui::ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {
			for line in self.runtime.log.lines() {
				ui.label(line);
			}
		});
	}

	fn ui_settings(&mut self, ui: &mut egui::Ui) {
		settings::ui(ui, &self.runtime);
	}
}

impl eframe::App for MapCue {
	fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
		egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
			ui.horizontal(|ui| {
				ui.selectable_value(&mut self.tab, Tab::Home, "Home");
				ui.selectable_value(&mut self.tab, Tab::Settings, "Settings");
			});
		});

		egui::CentralPanel::default().show(ctx, |ui| match self.tab {
			Tab::Home => self.ui_home(ui),
			Tab::Settings => self.ui_settings(ui),
		});

		// Announcements arrive from other threads.
		ctx.request_repaint_after(Duration::from_millis(250));
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tab {
	Home,
	Settings,
}
