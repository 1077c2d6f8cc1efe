use serde::{Deserialize, Serialize};

use crate::{CaptureError, ColorRange, Frame, FrameSource, ScreenRect};

/// A single screen pixel expected to carry a known UI color
/// (e.g. the corner of the full-screen map).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelProbe {
	pub x: i32,
	pub y: i32,
	pub color: ColorRange,
}

impl PixelProbe {
	pub const fn new(x: i32, y: i32, color: ColorRange) -> Self {
		Self { x, y, color }
	}

	pub fn region(&self) -> ScreenRect {
		ScreenRect::new(self.x, self.y, 1, 1)
	}

	/// Capture the probed pixel and test it.
	pub fn check(&self, source: &dyn FrameSource) -> Result<bool, CaptureError> {
		let frame = source.capture(self.region())?;
		Ok(self.matches(&frame))
	}

	/// Test an already captured frame. False when the probe lies outside it.
	pub fn matches(&self, frame: &Frame) -> bool {
		let region = frame.region();
		if !region.contains_point(self.x, self.y) {
			return false;
		}
		let (fx, fy) = ((self.x - region.x) as u32, (self.y - region.y) as u32);
		frame.pixel(fx, fy).is_some_and(|c| self.color.contains(c))
	}
}
