use vision::{CaptureError, MarkerKind};

use crate::{InputError, TimeoutReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavError {
	#[error(transparent)]
	Capture(#[from] CaptureError),
	#[error("no {} marker on the map", .0.label())]
	DetectionMiss(MarkerKind),
	#[error("map calibration missing or stale")]
	CalibrationMissing,
	#[error("invalid calibration (zoom {0})")]
	InvalidCalibration(f32),
	#[error("auto-turn did not converge: {0}")]
	ControlTimeout(TimeoutReason),
	#[error("auto-turn cancelled")]
	ControlCancelled,
	#[error("unknown target {0:?}")]
	TargetUnknown(String),
	#[error(transparent)]
	Input(#[from] InputError),
}
