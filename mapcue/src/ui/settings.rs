use crate::dispatch::Command;
use crate::runtime::Runtime;

fn slider<T: egui::emath::Numeric>(
	ui: &mut egui::Ui,
	value: &mut T,
	range: std::ops::RangeInclusive<T>,
	text: &str,
) -> bool {
	ui.add(egui::Slider::new(value, range).text(text)).changed()
}

pub fn ui(ui: &mut egui::Ui, runtime: &Runtime) {
	let mut config = runtime.config.snapshot();
	let mut changed = false;

	ui.label("Audio");
	changed |= slider(ui, &mut config.volume, 0.0..=1.0, "Cue volume");

	ui.separator();
	ui.label("Directions");
	changed |= slider(ui, &mut config.feedback.near_below, 1.0..=500.0, "Near below (map units)");
	changed |= slider(ui, &mut config.feedback.far_from, 1.0..=2000.0, "Far from (map units)");
	changed |= slider(ui, &mut config.feedback.meters_per_unit, 0.1..=20.0, "Meters per map unit");
	changed |= slider(ui, &mut config.feedback.facing_cone_deg, 1.0..=90.0, "Facing cone (degrees)");
	changed |= slider(ui, &mut config.feedback.max_audible_distance, 10.0..=3000.0, "Cue fades out by (meters)");
	changed |= slider(ui, &mut config.feedback.min_volume, 0.0..=1.0, "Quietest cue");

	ui.separator();
	ui.label("Auto turn");
	changed |= slider(ui, &mut config.auto_turn.tolerance_deg, 1.0..=45.0, "Tolerance (degrees)");
	changed |= slider(ui, &mut config.auto_turn.gain, 0.1..=1.0, "Gain");
	changed |= slider(ui, &mut config.auto_turn.max_step_deg, 1.0..=180.0, "Max step (degrees)");
	changed |= slider(ui, &mut config.auto_turn.miss_limit, 1..=20, "Miss limit");
	changed |= slider(ui, &mut config.auto_turn.max_ticks, 1..=200, "Max ticks");
	changed |= slider(ui, &mut config.auto_turn.max_duration_ms, 500..=30_000, "Time budget (ms)");
	changed |= slider(ui, &mut config.auto_turn.settle_ms, 0..=1000, "Settle wait (ms)");

	ui.separator();
	ui.label("Mouse");
	changed |= slider(ui, &mut config.input.counts_per_degree, 0.5..=100.0, "Counts per degree");
	changed |= slider(ui, &mut config.input.steps, 1..=50, "Sub-moves per turn");
	changed |= slider(ui, &mut config.input.step_delay_ms, 0..=50, "Delay between sub-moves (ms)");
	changed |= ui.checkbox(&mut config.input.invert_y, "Invert vertical look").changed();
	changed |= slider(ui, &mut config.input.recenter_sweep_deg, 0.0..=180.0, "Recenter sweep down (degrees)");
	changed |= slider(ui, &mut config.input.recenter_back_deg, 0.0..=180.0, "Recenter back up (degrees)");

	ui.separator();
	ui.label("Speech");
	changed |= ui.checkbox(&mut config.speech.enabled, "Speak announcements").changed();
	changed |= ui
		.checkbox(&mut config.speech.interrupt, "New announcements interrupt the current one")
		.changed();
	changed |= slider(ui, &mut config.speech.volume, 0.0..=1.0, "Speech volume");

	ui.separator();
	ui.label("POIs");
	changed |= ui
		.checkbox(&mut config.pois.fetch_remote, "Download the current POI list")
		.changed();

	ui.separator();
	if ui.button("Recalibrate map from config").clicked() {
		runtime.send(Command::Recalibrate);
	}

	if changed && runtime.config.replace(config.clone()) {
		if let Err(err) = config.save() {
			tracing::warn!("failed to save config: {err:#}");
		}
		runtime.send(Command::ReloadConfig);
	}
}
