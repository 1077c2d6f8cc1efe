//! Turning a [`BearingResult`] into something a player can hear.
//!
//! [`compose`] is a pure function; [`DirectionalFeedbackRenderer`] only adds
//! the hand-off to an [`Announce`] sink.

use serde::{Deserialize, Serialize};
use vision::normalize_degrees;

use crate::{Announce, BearingResult, BearingStatus, Outcome, TimeoutReason, relative_bearing};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
	/// Distances (map units) below this are "near".
	pub near_below: f32,
	/// Distances (map units) from this on are "far".
	pub far_from: f32,
	/// Game meters per map unit, for the spoken distance.
	pub meters_per_unit: f32,
	/// Targets within this many degrees of the facing are announced as "facing".
	pub facing_cone_deg: f32,
	/// Cue volume falls linearly to `min_volume` at this many meters.
	pub max_audible_distance: f32,
	pub min_volume: f32,
}

impl Default for FeedbackConfig {
	fn default() -> Self {
		Self {
			near_below: 40.0,
			far_from: 150.0,
			meters_per_unit: 2.65,
			facing_cone_deg: 20.0,
			max_audible_distance: 600.0,
			min_volume: 0.2,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceBucket {
	Near,
	Medium,
	Far,
}

impl DistanceBucket {
	pub fn classify(distance_units: f32, config: &FeedbackConfig) -> Self {
		if distance_units < config.near_below {
			Self::Near
		} else if distance_units >= config.far_from {
			Self::Far
		} else {
			Self::Medium
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			Self::Near => "near",
			Self::Medium => "medium",
			Self::Far => "far",
		}
	}
}

/// Which non-speech tone accompanies an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
	Direction { behind: bool },
	Facing,
	NotFound,
	Recalibrating,
	DetectionUnavailable,
	Aligned,
	CouldNotAlign,
	Cancelled,
	/// Plain status speech, no directional meaning.
	Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
	pub text: String,
	/// -1.0 = hard left, 1.0 = hard right.
	pub pan: f32,
	pub cue: Cue,
	/// Loudness factor in `[0, 1]`, lower for distant targets.
	pub volume: f32,
	/// Set only for valid directional feedback, `(-180, 180]`.
	pub relative_bearing: Option<f32>,
}

impl Feedback {
	fn centered(cue: Cue, text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			pan: 0.0,
			cue,
			volume: 1.0,
			relative_bearing: None,
		}
	}
}

#[inline]
pub fn pan_for(relative: f32) -> f32 {
	(relative / 90.0).clamp(-1.0, 1.0)
}

/// 1..=12, where 12 is straight ahead.
pub fn clock_direction(relative: f32) -> u8 {
	let hour = (normalize_degrees(relative) / 30.0).round() as u32 % 12;
	if hour == 0 { 12 } else { hour as u8 }
}

pub fn relative_direction(relative: f32) -> &'static str {
	const SECTORS: [&str; 8] = [
		"in front",
		"in front and to the right",
		"to the right",
		"behind and to the right",
		"behind",
		"behind and to the left",
		"to the left",
		"in front and to the left",
	];
	let idx = ((normalize_degrees(relative) + 22.5) / 45.0).floor() as usize % 8;
	SECTORS[idx]
}

/// `1 - min(meters / max, 1)`, kept above the configured floor.
pub fn volume_for(meters: f32, config: &FeedbackConfig) -> f32 {
	let floor = config.min_volume.clamp(0.0, 1.0);
	if !meters.is_finite() {
		return floor;
	}
	if !(config.max_audible_distance > 0.0) {
		return 1.0;
	}
	(1.0 - (meters.max(0.0) / config.max_audible_distance).min(1.0)).max(floor)
}

pub fn cardinal(bearing: f32) -> &'static str {
	const NAMES: [&str; 8] = [
		"north",
		"northeast",
		"east",
		"southeast",
		"south",
		"southwest",
		"west",
		"northwest",
	];
	let idx = ((normalize_degrees(bearing) + 22.5) / 45.0).floor() as usize % 8;
	NAMES[idx]
}

/// Feedback for `result`, seen from a player facing `player_facing_degrees`.
///
/// Invalid results produce a status cue and never reuse the numbers inside.
pub fn compose(config: &FeedbackConfig, target: &str, result: &BearingResult, player_facing_degrees: f32) -> Feedback {
	// Rounded first so 359.6 is spoken as 0, not 360.
	let bearing = normalize_degrees(result.bearing_degrees.round());
	let meters = (result.distance_units * config.meters_per_unit).round() as u32;

	if result.is_valid() && !player_facing_degrees.is_finite() {
		return Feedback::centered(
			Cue::NotFound,
			format!(
				"{target}, {meters} meters, {} at {bearing:.0} degrees. Player direction not found",
				cardinal(bearing)
			),
		);
	}

	match result.status {
		BearingStatus::Valid => {}
		BearingStatus::PlayerNotFound => return Feedback::centered(Cue::NotFound, "Player not found"),
		BearingStatus::FacingUnknown => return Feedback::centered(Cue::NotFound, "Player direction not found"),
		BearingStatus::TargetNotFound => return Feedback::centered(Cue::NotFound, format!("{target} not found")),
		BearingStatus::CalibrationMissing => return Feedback::centered(Cue::Recalibrating, "Recalibrating, open the map"),
		BearingStatus::DetectionUnavailable => {
			return Feedback::centered(Cue::DetectionUnavailable, "Detection unavailable");
		}
	}

	let rel = relative_bearing(result.bearing_degrees, player_facing_degrees);
	let bucket = DistanceBucket::classify(result.distance_units, config);
	let clock = clock_direction(rel);
	let facing = normalize_degrees(player_facing_degrees.round());
	let compass = format!(
		"{} at {bearing:.0} degrees, facing {} at {facing:.0} degrees",
		cardinal(bearing),
		cardinal(facing)
	);

	let (text, cue) = if rel.abs() <= config.facing_cone_deg {
		(
			format!("Facing {target}, {meters} meters, {clock} o'clock, {}, {compass}", bucket.label()),
			Cue::Facing,
		)
	} else {
		(
			format!(
				"{target}, {meters} meters {}, {clock} o'clock, {}, {compass}",
				relative_direction(rel),
				bucket.label()
			),
			Cue::Direction { behind: rel.abs() > 90.0 },
		)
	};

	Feedback {
		text,
		pan: pan_for(rel),
		cue,
		volume: volume_for(result.distance_units * config.meters_per_unit, config),
		relative_bearing: Some(rel),
	}
}

/// "Facing northeast, 45 degrees".
pub fn compose_facing(facing: Option<f32>) -> Feedback {
	match facing.filter(|f| f.is_finite()) {
		Some(f) => {
			let f = normalize_degrees(f);
			Feedback::centered(Cue::Facing, format!("Facing {}, {:.0} degrees", cardinal(f), f))
		}
		None => Feedback::centered(Cue::NotFound, "Player direction not found"),
	}
}

fn third(t: f32) -> i8 {
	if t < 1.0 / 3.0 {
		-1
	} else if t > 2.0 / 3.0 {
		1
	} else {
		0
	}
}

/// "Player is in the top-left of the bottom-right quadrant".
///
/// `u` and `v` are the player's position across and down the map region,
/// both in `[0, 1]`.
pub fn compose_position(u: f32, v: f32, facing: Option<f32>) -> Feedback {
	if !(u.is_finite() && v.is_finite()) {
		return Feedback::centered(Cue::NotFound, "Player not found");
	}
	let (u, v) = (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0));
	let right = u >= 0.5;
	let bottom = v >= 0.5;
	let quadrant = match (bottom, right) {
		(false, false) => "top-left",
		(false, true) => "top-right",
		(true, false) => "bottom-left",
		(true, true) => "bottom-right",
	};

	// Position inside the quadrant, in thirds.
	let qu = (if right { u - 0.5 } else { u }) * 2.0;
	let qv = (if bottom { v - 0.5 } else { v }) * 2.0;
	let vertical = match third(qv) {
		-1 => "top",
		1 => "bottom",
		_ => "",
	};
	let horizontal = match third(qu) {
		-1 => "left",
		1 => "right",
		_ => "",
	};
	let within = match (vertical, horizontal) {
		("", "") => "center".to_owned(),
		(only, "") | ("", only) => only.to_owned(),
		(vert, horiz) => format!("{vert}-{horiz}"),
	};

	let mut text = format!("Player is in the {within} of the {quadrant} quadrant");
	if let Some(f) = facing.filter(|f| f.is_finite()) {
		let f = normalize_degrees(f);
		text.push_str(&format!(", facing {} at {f:.0} degrees", cardinal(f)));
	}
	Feedback::centered(Cue::Info, text)
}

pub fn compose_outcome(target: &str, outcome: &Outcome) -> Feedback {
	match outcome {
		Outcome::Converged { .. } => Feedback::centered(Cue::Aligned, format!("Facing {target}")),
		Outcome::TimedOut(TimeoutReason::Unavailable) => {
			Feedback::centered(Cue::DetectionUnavailable, "Detection unavailable, could not align")
		}
		Outcome::TimedOut(_) => Feedback::centered(Cue::CouldNotAlign, format!("Could not align to {target}")),
		Outcome::Cancelled => Feedback::centered(Cue::Cancelled, "Auto turn cancelled"),
		Outcome::InputFailed(err) => Feedback::centered(Cue::CouldNotAlign, format!("Could not turn: {err}")),
	}
}

/// Composes feedback and pushes it to the sink; never waits for playback.
pub struct DirectionalFeedbackRenderer<S> {
	config: FeedbackConfig,
	sink: S,
}

impl<S: Announce> DirectionalFeedbackRenderer<S> {
	pub fn new(config: FeedbackConfig, sink: S) -> Self {
		Self { config, sink }
	}

	pub fn config(&self) -> &FeedbackConfig {
		&self.config
	}

	pub fn set_config(&mut self, config: FeedbackConfig) {
		self.config = config;
	}

	pub fn render(&self, target: &str, result: &BearingResult, player_facing_degrees: f32) -> Feedback {
		let feedback = compose(&self.config, target, result, player_facing_degrees);
		tracing::debug!(status = ?result.status, pan = feedback.pan, text = %feedback.text, "render");
		self.sink.announce(&feedback);
		feedback
	}

	pub fn render_facing(&self, facing: Option<f32>) -> Feedback {
		let feedback = compose_facing(facing);
		self.sink.announce(&feedback);
		feedback
	}

	pub fn render_position(&self, u: f32, v: f32, facing: Option<f32>) -> Feedback {
		let feedback = compose_position(u, v, facing);
		self.sink.announce(&feedback);
		feedback
	}

	pub fn render_outcome(&self, target: &str, outcome: &Outcome) -> Feedback {
		let feedback = compose_outcome(target, outcome);
		self.sink.announce(&feedback);
		feedback
	}

	/// Plain status text (e.g. "Target: Pleasant Park").
	pub fn say(&self, text: &str) {
		self.sink.announce(&Feedback::centered(Cue::Info, text));
	}
}
