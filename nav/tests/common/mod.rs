#![allow(dead_code)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

use nav::{
	Announce, BearingResult, BearingStatus, CancelToken, Clock, Feedback, Fix, InputError, Locate, MapSpacePoint,
	NamedPoint, Target, TargetProvider, TurnInput,
};
use vision::{CaptureError, Color, Frame, FrameSource, ScreenRect};

/// Time only moves when someone sleeps.
pub struct ManualClock {
	start: Instant,
	offset: Mutex<Duration>,
}

impl ManualClock {
	pub fn new() -> Self {
		Self {
			start: Instant::now(),
			offset: Mutex::new(Duration::ZERO),
		}
	}

	pub fn elapsed(&self) -> Duration {
		*self.offset.lock().unwrap()
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.start + self.elapsed()
	}

	fn sleep(&self, duration: Duration) {
		*self.offset.lock().unwrap() += duration;
	}
}

/// A player standing on a turntable: every turn command rotates the facing
/// by exactly the commanded amount, and every sample reports the error.
pub struct Turntable {
	pub facing: Mutex<f32>,
	pub bearings: Vec<(Target, f32)>,
	/// Forces every sample invalid with this status.
	pub failing: Option<BearingStatus>,
	/// Ignore turn commands.
	pub frozen: bool,
	pub reject: bool,
	pub turns: Mutex<Vec<f32>>,
	pub samples: Mutex<u32>,
	/// Cancel this token once the given number of turns were issued.
	pub cancel_after: Mutex<Option<(usize, CancelToken)>>,
	/// Real sleep inside each sample, for thread tests.
	pub sample_delay: Duration,
}

impl Turntable {
	pub fn new(facing: f32, bearing: f32) -> Self {
		Self {
			facing: Mutex::new(facing),
			bearings: vec![(Target::PlacedMarker, bearing)],
			failing: None,
			frozen: false,
			reject: false,
			turns: Mutex::new(Vec::new()),
			samples: Mutex::new(0),
			cancel_after: Mutex::new(None),
			sample_delay: Duration::ZERO,
		}
	}

	pub fn failing(mut self, status: BearingStatus) -> Self {
		self.failing = Some(status);
		self
	}

	pub fn frozen(mut self) -> Self {
		self.frozen = true;
		self
	}

	pub fn with_target(mut self, target: Target, bearing: f32) -> Self {
		self.bearings.push((target, bearing));
		self
	}

	pub fn turns(&self) -> Vec<f32> {
		self.turns.lock().unwrap().clone()
	}
}

impl Locate for Turntable {
	fn locate(&self, target: &Target) -> Fix {
		*self.samples.lock().unwrap() += 1;
		if !self.sample_delay.is_zero() {
			std::thread::sleep(self.sample_delay);
		}
		if let Some(status) = self.failing {
			return Fix::failed(target.label(), status);
		}
		let Some((_, bearing)) = self.bearings.iter().find(|(t, _)| t == target) else {
			return Fix::failed(target.label(), BearingStatus::TargetNotFound);
		};
		Fix {
			target: target.label(),
			result: BearingResult::valid(*bearing, 25.0),
			facing: Some(*self.facing.lock().unwrap()),
			player: None,
		}
	}
}

impl TurnInput for Turntable {
	fn turn(&self, delta_degrees: f32) -> Result<(), InputError> {
		if self.reject {
			return Err(InputError::Rejected("device busy".into()));
		}
		let mut turns = self.turns.lock().unwrap();
		turns.push(delta_degrees);
		if !self.frozen {
			*self.facing.lock().unwrap() += delta_degrees;
		}
		if let Some((after, token)) = &*self.cancel_after.lock().unwrap() {
			if turns.len() >= *after {
				token.cancel();
			}
		}
		Ok(())
	}

	fn look(&self, _delta_degrees: f32) -> Result<(), InputError> {
		Ok(())
	}
}

#[derive(Default)]
pub struct Recorder(pub Mutex<Vec<Feedback>>);

impl Announce for Recorder {
	fn announce(&self, feedback: &Feedback) {
		self.0.lock().unwrap().push(feedback.clone());
	}
}

/// Paints the whole virtual screen with a function of screen coordinates.
pub struct Scene(pub Box<dyn Fn(i32, i32) -> Color + Send + Sync>);

impl FrameSource for Scene {
	fn capture(&self, region: ScreenRect) -> Result<Frame, CaptureError> {
		if region.is_empty() {
			return Err(CaptureError::OffScreen(region));
		}
		Ok(Frame::from_fn(region, |x, y| (self.0)(region.x + x as i32, region.y + y as i32)))
	}
}

pub struct Unplugged;

impl FrameSource for Unplugged {
	fn capture(&self, _region: ScreenRect) -> Result<Frame, CaptureError> {
		Err(CaptureError::DisplayUnavailable("session locked".into()))
	}
}

pub const BG: Color = Color::new(40, 60, 40);
pub const YELLOW: Color = Color::new(247, 255, 26);
pub const RED: Color = Color::new(236, 60, 60);

pub fn in_disc(x: i32, y: i32, cx: i32, cy: i32, r: i32) -> bool {
	(x - cx).pow(2) + (y - cy).pow(2) <= r * r
}

/// Player arrow whose vertex centroid sits on (cx, cy), pointing at `heading`.
pub fn in_arrow(x: i32, y: i32, cx: f32, cy: f32, heading: f32) -> bool {
	let rad = heading.to_radians();
	let (fx, fy) = (rad.sin(), -rad.cos());
	let (px, py) = (-fy, fx);
	let a = (cx + 28.0 / 3.0 * fx, cy + 28.0 / 3.0 * fy);
	let b = (cx - 14.0 / 3.0 * fx + 5.0 * px, cy - 14.0 / 3.0 * fy + 5.0 * py);
	let c = (cx - 14.0 / 3.0 * fx - 5.0 * px, cy - 14.0 / 3.0 * fy - 5.0 * py);
	let p = (x as f32, y as f32);
	let side = |u: (f32, f32), v: (f32, f32)| (v.0 - u.0) * (p.1 - u.1) - (v.1 - u.1) * (p.0 - u.0);
	let (d1, d2, d3) = (side(a, b), side(b, c), side(c, a));
	let neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
	let pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
	!(neg && pos)
}

pub struct StaticPois(pub Vec<NamedPoint>);

impl TargetProvider for StaticPois {
	fn get_target(&self, name: &str) -> Option<NamedPoint> {
		self.0.iter().find(|p| p.name.eq_ignore_ascii_case(name)).cloned()
	}
}

pub fn poi(name: &str, x: f32, y: f32) -> NamedPoint {
	NamedPoint {
		name: name.to_owned(),
		point: MapSpacePoint::new(x, y),
	}
}

pub fn angle_diff(a: f32, b: f32) -> f32 {
	let d = (a - b).rem_euclid(360.0);
	d.min(360.0 - d)
}
