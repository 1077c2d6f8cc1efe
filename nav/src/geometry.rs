//! Pixel → map-space conversion, bearings and distances.
//!
//! Angles are compass degrees: 0 = map north (up on the frame), clockwise
//! positive, always normalized to `[0, 360)`. Relative angles use `(-180, 180]`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vision::{Marker, MarkerKind, heading_from_vector, normalize_degrees};

use crate::NavError;

/// A position in the map's logical coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MapSpacePoint {
	pub x: f32,
	pub y: f32,
}

impl MapSpacePoint {
	pub const fn new(x: f32, y: f32) -> Self {
		Self { x, y }
	}

	#[inline]
	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}

	pub fn distance(&self, other: MapSpacePoint) -> f32 {
		(other.x - self.x).hypot(other.y - self.y)
	}
}

/// Pan/zoom state of the map view.
///
/// `pan_x`/`pan_y` is the frame pixel where the map-space origin lies, `zoom`
/// is frame pixels per map unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
	pub pan_x: f32,
	pub pan_y: f32,
	pub zoom: f32,
}

impl Default for Calibration {
	fn default() -> Self {
		Self {
			pan_x: 0.0,
			pan_y: 0.0,
			zoom: 1.0,
		}
	}
}

impl Calibration {
	pub fn is_valid(&self) -> bool {
		self.pan_x.is_finite() && self.pan_y.is_finite() && self.zoom.is_finite() && self.zoom > 0.0
	}
}

/// Map `deg` into `(-180, 180]`.
pub fn normalize_signed(deg: f32) -> f32 {
	let d = normalize_degrees(deg);
	if d > 180.0 { d - 360.0 } else { d }
}

/// Angle from `facing` to `bearing`, positive = clockwise (to the right).
#[inline]
pub fn relative_bearing(bearing: f32, facing: f32) -> f32 {
	normalize_signed(bearing - facing)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BearingStatus {
	Valid,
	PlayerNotFound,
	FacingUnknown,
	TargetNotFound,
	CalibrationMissing,
	DetectionUnavailable,
}

impl From<&NavError> for BearingStatus {
	fn from(err: &NavError) -> Self {
		match err {
			NavError::Capture(_) => Self::DetectionUnavailable,
			NavError::DetectionMiss(MarkerKind::Player) => Self::PlayerNotFound,
			NavError::CalibrationMissing | NavError::InvalidCalibration(_) => Self::CalibrationMissing,
			_ => Self::TargetNotFound,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearingResult {
	/// Compass bearing from the player to the target, `[0, 360)`.
	pub bearing_degrees: f32,
	/// Euclidean distance in map units.
	pub distance_units: f32,
	pub status: BearingStatus,
}

impl BearingResult {
	pub fn valid(bearing_degrees: f32, distance_units: f32) -> Self {
		Self {
			bearing_degrees: normalize_degrees(bearing_degrees),
			distance_units,
			status: BearingStatus::Valid,
		}
	}

	pub fn invalid(status: BearingStatus) -> Self {
		Self {
			bearing_degrees: 0.0,
			distance_units: 0.0,
			status,
		}
	}

	#[inline]
	pub fn is_valid(&self) -> bool {
		self.status == BearingStatus::Valid
	}
}

/// Holds the current calibration and converts between pixels and map space.
///
/// Calibration is never assumed stable: callers set it whenever the map view
/// is (re)derived, and with a `max_age` it silently expires.
#[derive(Debug, Clone, Default)]
pub struct CoordinateSystem {
	calibration: Option<(Calibration, Instant)>,
	max_age: Option<Duration>,
}

impl CoordinateSystem {
	pub fn new(max_age: Option<Duration>) -> Self {
		Self {
			calibration: None,
			max_age,
		}
	}

	pub fn set_max_age(&mut self, max_age: Option<Duration>) {
		self.max_age = max_age;
	}

	pub fn set_calibration(&mut self, calibration: Calibration) -> Result<(), NavError> {
		self.set_calibration_at(calibration, Instant::now())
	}

	pub fn set_calibration_at(&mut self, calibration: Calibration, now: Instant) -> Result<(), NavError> {
		if !calibration.is_valid() {
			self.calibration = None;
			return Err(NavError::InvalidCalibration(calibration.zoom));
		}
		self.calibration = Some((calibration, now));
		Ok(())
	}

	pub fn invalidate(&mut self) {
		if self.calibration.take().is_some() {
			tracing::debug!("calibration invalidated");
		}
	}

	/// The calibration in force at `now`, if set and not stale.
	pub fn calibration_at(&self, now: Instant) -> Option<Calibration> {
		let (cal, set_at) = self.calibration?;
		match self.max_age {
			Some(max) if now.saturating_duration_since(set_at) > max => None,
			_ => Some(cal),
		}
	}

	pub fn calibration(&self) -> Option<Calibration> {
		self.calibration_at(Instant::now())
	}

	pub fn to_map_space(&self, marker: &Marker) -> Result<MapSpacePoint, NavError> {
		self.to_map_space_at(marker, Instant::now())
	}

	pub fn to_map_space_at(&self, marker: &Marker, now: Instant) -> Result<MapSpacePoint, NavError> {
		let cal = self.calibration_at(now).ok_or(NavError::CalibrationMissing)?;
		Ok(MapSpacePoint::new(
			(marker.px - cal.pan_x) / cal.zoom,
			(marker.py - cal.pan_y) / cal.zoom,
		))
	}

	/// Inverse of [`to_map_space`](Self::to_map_space).
	pub fn to_pixel(&self, point: MapSpacePoint) -> Result<(f32, f32), NavError> {
		let cal = self.calibration().ok_or(NavError::CalibrationMissing)?;
		Ok((point.x * cal.zoom + cal.pan_x, point.y * cal.zoom + cal.pan_y))
	}

	pub fn bearing_to(&self, from: &Marker, to: MapSpacePoint) -> BearingResult {
		self.bearing_to_at(from, to, Instant::now())
	}

	pub fn bearing_to_at(&self, from: &Marker, to: MapSpacePoint, now: Instant) -> BearingResult {
		let Ok(origin) = self.to_map_space_at(from, now) else {
			return BearingResult::invalid(BearingStatus::CalibrationMissing);
		};
		if !from.position_valid() {
			return BearingResult::invalid(BearingStatus::PlayerNotFound);
		}
		if from.kind == MarkerKind::Player && !from.facing_valid() {
			return BearingResult::invalid(BearingStatus::FacingUnknown);
		}
		if !to.is_finite() {
			return BearingResult::invalid(BearingStatus::TargetNotFound);
		}

		let (dx, dy) = (to.x - origin.x, to.y - origin.y);
		BearingResult::valid(heading_from_vector(dx, dy), dx.hypot(dy))
	}
}
