use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use vision::{CaptureError, Frame, FrameSource, ScreenRect};

/// Display geometry in virtual-desktop coordinates.
fn monitor_bounds(monitor: &xcap::Monitor) -> Option<ScreenRect> {
	Some(ScreenRect::new(
		monitor.x().ok()?,
		monitor.y().ok()?,
		monitor.width().ok()?,
		monitor.height().ok()?,
	))
}

/// Whether `frame` can still answer a capture of `region`.
fn reusable(frame: &Frame, region: ScreenRect, within: Duration) -> bool {
	frame.captured_at().elapsed() <= within && frame.region().contains_rect(&region)
}

/// Captures screen rectangles with `xcap`, from whichever monitor fully
/// contains the requested region.
///
/// A monitor grab is kept for `reuse_within`, so the map probe, the map and
/// the facing region of one pass share a single screenshot.
#[derive(Debug)]
pub struct ScreenSource {
	reuse_within: Duration,
	last: Mutex<Option<Frame>>,
}

impl ScreenSource {
	pub fn new(reuse_within: Duration) -> Self {
		Self {
			reuse_within,
			last: Mutex::new(None),
		}
	}

	fn find_monitor(region: ScreenRect) -> Result<(xcap::Monitor, ScreenRect), CaptureError> {
		let monitors = xcap::Monitor::all().map_err(|err| CaptureError::DisplayUnavailable(err.to_string()))?;
		if monitors.is_empty() {
			return Err(CaptureError::DisplayUnavailable("no monitors".to_owned()));
		}
		monitors
			.into_iter()
			.filter_map(|m| monitor_bounds(&m).map(|b| (m, b)))
			.find(|(_, b)| b.contains_rect(&region))
			.ok_or(CaptureError::OffScreen(region))
	}

	fn grab(region: ScreenRect) -> Result<Frame, CaptureError> {
		let (monitor, bounds) = Self::find_monitor(region)?;
		let image = monitor
			.capture_image()
			.map_err(|err| CaptureError::Backend(err.to_string()))?;
		Ok(Frame::from_rgba(bounds, image.width(), image.as_raw()))
	}
}

impl FrameSource for ScreenSource {
	fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError> {
		if region.is_empty() {
			return Err(CaptureError::OffScreen(region));
		}
		let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(frame) = last.as_ref().filter(|f| reusable(f, region, self.reuse_within)) {
			if let Some(part) = frame.crop(region) {
				return Ok(part);
			}
		}

		let screen = Self::grab(region)?;
		let part = screen.crop(region).ok_or(CaptureError::OffScreen(region))?;
		*last = Some(screen);
		Ok(part)
	}
}
