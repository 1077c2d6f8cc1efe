//! One detection pass: capture → detect → map space → bearing.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vision::{Color, ColorRange, FrameSource, Marker, MarkerKind, Palette, PixelProbe, ScreenRect};

use crate::{BearingResult, BearingStatus, Calibration, CoordinateSystem, MapSpacePoint, NavError, TargetProvider};

/// What the user wants to be guided to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
	/// A named POI resolved through the [`TargetProvider`].
	Poi(String),
	/// The destination marker placed on the map.
	PlacedMarker,
	/// The closest palette-matched object to the player.
	NearestObject,
}

impl Target {
	pub fn label(&self) -> String {
		match self {
			Self::Poi(name) => name.clone(),
			Self::PlacedMarker => "map marker".to_owned(),
			Self::NearestObject => "nearest object".to_owned(),
		}
	}
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
	/// Display name of the resolved target.
	pub target: String,
	pub result: BearingResult,
	pub facing: Option<f32>,
	pub player: Option<Marker>,
}

impl Fix {
	pub fn failed(target: String, status: BearingStatus) -> Self {
		Self {
			target,
			result: BearingResult::invalid(status),
			facing: None,
			player: None,
		}
	}

	/// Signed error between facing and bearing, when both are known.
	pub fn relative_bearing(&self) -> Option<f32> {
		if !self.result.is_valid() {
			return None;
		}
		self.facing
			.filter(|f| f.is_finite())
			.map(|f| crate::relative_bearing(self.result.bearing_degrees, f))
	}
}

/// Anything that can produce a [`Fix`] for a target.
pub trait Locate: Send + Sync {
	fn locate(&self, target: &Target) -> Fix;
}

impl<T: Locate + ?Sized> Locate for Arc<T> {
	fn locate(&self, target: &Target) -> Fix {
		(**self).locate(target)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
	/// Screen rectangle holding the map.
	pub map_region: ScreenRect,
	/// Optional second region (e.g. the minimap) read only for the player's facing.
	pub facing_region: Option<ScreenRect>,
	pub palette: Palette,
	/// When set, the calibration is only trusted while this pixel matches
	/// (e.g. "full map open"); otherwise it is invalidated.
	pub map_probe: Option<PixelProbe>,
	pub calibration: Calibration,
	pub calibration_max_age_ms: Option<u64>,
}

impl Default for LocatorConfig {
	/// Full-screen map at 1080p. Map space is screen pixels, so POIs measured
	/// on screen can be used as-is.
	fn default() -> Self {
		let map_region = ScreenRect::from_corners((524, 84), (1390, 1010));
		Self {
			map_region,
			facing_region: None,
			palette: Palette::default(),
			map_probe: Some(PixelProbe::new(66, 66, ColorRange::new(Color::new(247, 255, 26), 15))),
			calibration: Calibration {
				pan_x: -map_region.x as f32,
				pan_y: -map_region.y as f32,
				zoom: 1.0,
			},
			calibration_max_age_ms: None,
		}
	}
}

struct State {
	config: LocatorConfig,
	coords: CoordinateSystem,
}

/// Serializes capture + detection + bearing behind one lock, so manual
/// requests and auto-turn ticks never interleave.
pub struct Locator {
	source: Arc<dyn FrameSource>,
	targets: Arc<dyn TargetProvider>,
	state: Mutex<State>,
}

impl Locator {
	pub fn new(source: Arc<dyn FrameSource>, targets: Arc<dyn TargetProvider>, config: LocatorConfig) -> Self {
		let locator = Self {
			source,
			targets,
			state: Mutex::new(State {
				config: LocatorConfig::default(),
				coords: CoordinateSystem::default(),
			}),
		};
		locator.reconfigure(config);
		locator
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Swap in a new configuration and re-derive the calibration.
	pub fn reconfigure(&self, config: LocatorConfig) {
		let mut state = self.lock();
		state
			.coords
			.set_max_age(config.calibration_max_age_ms.map(Duration::from_millis));
		if let Err(err) = state.coords.set_calibration(config.calibration) {
			tracing::warn!(error = %err, "configured calibration rejected");
		}
		state.config = config;
	}

	/// Replace the calibration (e.g. after the user re-measured the map).
	pub fn calibrate(&self, calibration: Calibration) -> Result<(), NavError> {
		let mut state = self.lock();
		state.coords.set_calibration(calibration)?;
		state.config.calibration = calibration;
		Ok(())
	}

	/// Detect the player on its own (used for "announce facing").
	pub fn player(&self) -> Result<Marker, NavError> {
		let state = self.lock();
		self.find_player(&state)
	}

	fn find_player(&self, state: &State) -> Result<Marker, NavError> {
		let frame = self.source.capture(state.config.map_region)?;
		let Some(mut player) = vision::find_marker(&frame, &state.config.palette, MarkerKind::Player) else {
			vision::debug_snapshot(&frame, "player_miss");
			return Err(NavError::DetectionMiss(MarkerKind::Player));
		};
		if let Some(facing) = self.facing_override(state) {
			player.facing = Some(facing);
		}
		Ok(player)
	}

	fn facing_override(&self, state: &State) -> Option<f32> {
		let region = state.config.facing_region?;
		match self.source.capture(region) {
			Ok(frame) => vision::find_marker(&frame, &state.config.palette, MarkerKind::Player).and_then(|m| m.facing),
			Err(err) => {
				tracing::debug!(error = %err, "facing region capture failed");
				None
			}
		}
	}

	fn refresh_calibration(&self, state: &mut State, now: Instant) -> Result<(), NavError> {
		if let Some(probe) = state.config.map_probe {
			if probe.check(&*self.source)? {
				let cal = state.config.calibration;
				state.coords.set_calibration_at(cal, now)?;
			} else {
				state.coords.invalidate();
			}
		}
		match state.coords.calibration_at(now) {
			Some(_) => Ok(()),
			None => Err(NavError::CalibrationMissing),
		}
	}

	fn pass(&self, state: &mut State, target: &Target) -> Result<Fix, NavError> {
		let now = Instant::now();
		self.refresh_calibration(state, now)?;

		let frame = self.source.capture(state.config.map_region)?;
		let markers = vision::detect(&frame, &state.config.palette);
		let Some(mut player) = markers.iter().find(|m| m.kind == MarkerKind::Player).copied() else {
			vision::debug_snapshot(&frame, "player_miss");
			return Err(NavError::DetectionMiss(MarkerKind::Player));
		};
		if let Some(facing) = self.facing_override(state) {
			player.facing = Some(facing);
		}

		let (name, point) = match target {
			Target::Poi(name) => {
				let found = self
					.targets
					.get_target(name)
					.ok_or_else(|| NavError::TargetUnknown(name.clone()))?;
				(found.name, found.point)
			}
			Target::PlacedMarker => {
				let marker = markers
					.iter()
					.find(|m| m.kind == MarkerKind::PoiTarget)
					.ok_or(NavError::DetectionMiss(MarkerKind::PoiTarget))?;
				(target.label(), state.coords.to_map_space_at(marker, now)?)
			}
			Target::NearestObject => {
				let origin = state.coords.to_map_space_at(&player, now)?;
				let nearest = markers
					.iter()
					.filter(|m| m.kind == MarkerKind::GenericObject)
					.filter_map(|m| state.coords.to_map_space_at(m, now).ok())
					.min_by(|a, b| origin.distance(*a).total_cmp(&origin.distance(*b)))
					.ok_or(NavError::DetectionMiss(MarkerKind::GenericObject))?;
				(target.label(), nearest)
			}
		};

		Ok(Fix {
			target: name,
			result: state.coords.bearing_to_at(&player, point, now),
			facing: player.facing,
			player: Some(player),
		})
	}

	/// Where the player is on the map region, as fractions of its width and
	/// height, plus the facing when readable.
	pub fn player_on_map(&self) -> Result<(f32, f32, Option<f32>), NavError> {
		let mut state = self.lock();
		self.refresh_calibration(&mut state, Instant::now())?;
		let player = self.find_player(&state)?;
		let region = state.config.map_region;
		Ok((
			player.px / region.width.max(1) as f32,
			player.py / region.height.max(1) as f32,
			player.facing,
		))
	}

	/// Map-space position of the player, for "nearest POI" lookups.
	pub fn player_position(&self) -> Result<MapSpacePoint, NavError> {
		let mut state = self.lock();
		let now = Instant::now();
		self.refresh_calibration(&mut state, now)?;
		let player = self.find_player(&state)?;
		state.coords.to_map_space_at(&player, now)
	}
}

impl Locate for Locator {
	fn locate(&self, target: &Target) -> Fix {
		let mut state = self.lock();
		match self.pass(&mut state, target) {
			Ok(fix) => fix,
			Err(err) => {
				match &err {
					NavError::Capture(_) | NavError::InvalidCalibration(_) => {
						tracing::warn!(error = %err, "locate failed")
					}
					_ => tracing::debug!(error = %err, "locate miss"),
				}
				Fix::failed(target.label(), BearingStatus::from(&err))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn config_fills_missing_fields() {
		let cfg: LocatorConfig = serde_json::from_str(r#"{"map_probe": null, "calibration_max_age_ms": 2000}"#).unwrap();
		assert_eq!(cfg.map_probe, None);
		assert_eq!(cfg.calibration_max_age_ms, Some(2000));
		assert_eq!(cfg.map_region, LocatorConfig::default().map_region);
		assert_eq!(cfg.calibration.pan_x, -524.0);
	}

	#[test]
	fn targets_serialize_by_name() {
		let target: Target = serde_json::from_str(r#"{"Poi":"Lazy Lake"}"#).unwrap();
		assert_eq!(target.label(), "Lazy Lake");
		assert_eq!(serde_json::to_string(&Target::PlacedMarker).unwrap(), r#""PlacedMarker""#);
	}

	#[test]
	fn relative_bearing_needs_a_valid_fix() {
		let failed = Fix::failed("x".into(), BearingStatus::PlayerNotFound);
		assert_eq!(failed.relative_bearing(), None);

		let fix = Fix {
			target: "x".into(),
			result: BearingResult::valid(350.0, 10.0),
			facing: Some(20.0),
			player: None,
		};
		assert!((fix.relative_bearing().unwrap() + 30.0).abs() < 1e-4);
	}
}
