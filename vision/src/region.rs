use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in screen coordinates.
///
/// `x`/`y` may be negative on multi-monitor setups where a display sits to the
/// left of or above the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenRect {
	pub x: i32,
	pub y: i32,
	pub width: u32,
	pub height: u32,
}

impl ScreenRect {
	pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
		Self { x, y, width, height }
	}

	/// Build a rectangle from an inclusive start corner and an exclusive end corner.
	pub fn from_corners(start: (i32, i32), end: (i32, i32)) -> Self {
		let (x1, x2) = (start.0.min(end.0), start.0.max(end.0));
		let (y1, y2) = (start.1.min(end.1), start.1.max(end.1));
		Self {
			x: x1,
			y: y1,
			width: (x2 - x1) as u32,
			height: (y2 - y1) as u32,
		}
	}

	#[inline]
	pub fn right(&self) -> i64 {
		self.x as i64 + self.width as i64
	}

	#[inline]
	pub fn bottom(&self) -> i64 {
		self.y as i64 + self.height as i64
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	pub fn contains_point(&self, x: i32, y: i32) -> bool {
		x >= self.x && y >= self.y && (x as i64) < self.right() && (y as i64) < self.bottom()
	}

	/// True if `other` lies entirely inside `self`.
	pub fn contains_rect(&self, other: &ScreenRect) -> bool {
		!other.is_empty()
			&& other.x >= self.x
			&& other.y >= self.y
			&& other.right() <= self.right()
			&& other.bottom() <= self.bottom()
	}
}
