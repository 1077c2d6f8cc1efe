//! Marker detection.
//!
//! One generic routine serves every [`MarkerRule`]: threshold the frame
//! against the rule's colors, group nearby matches into blobs, filter by area
//! and confidence, then pick the best candidate for exclusive kinds.
//! "Nothing found" is an empty result, never an error.

use std::collections::BTreeMap;

use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::{Frame, MarkerKind, MarkerRule, Palette, orientation};

/// A marker found on one frame. Not tracked across frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
	pub kind: MarkerKind,
	/// Frame-relative pixel position (blob centroid).
	pub px: f32,
	pub py: f32,
	/// 0.0..=1.0
	pub confidence: f32,
	/// Matching pixel count.
	pub area: u32,
	/// Facing in degrees (0 = map north, clockwise). `None` when the glyph
	/// orientation could not be read; the position may still be usable.
	pub facing: Option<f32>,
}

impl Marker {
	pub fn new(kind: MarkerKind, px: f32, py: f32) -> Self {
		Self {
			kind,
			px,
			py,
			confidence: 1.0,
			area: 0,
			facing: None,
		}
	}

	pub fn with_facing(mut self, degrees: f32) -> Self {
		self.facing = Some(degrees);
		self
	}

	#[inline]
	pub fn position_valid(&self) -> bool {
		self.px.is_finite() && self.py.is_finite()
	}

	#[inline]
	pub fn facing_valid(&self) -> bool {
		self.facing.is_some_and(f32::is_finite)
	}
}

/// Group of matching pixels for one rule.
#[derive(Debug, Default)]
pub(crate) struct Blob {
	pub pixels: Vec<(u32, u32)>,
	color_score: f32,
}

impl Blob {
	#[inline]
	pub fn area(&self) -> u32 {
		self.pixels.len() as u32
	}

	pub fn centroid(&self) -> (f32, f32) {
		let n = self.pixels.len().max(1) as f64;
		let (sx, sy) = self
			.pixels
			.iter()
			.fold((0.0f64, 0.0f64), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
		((sx / n) as f32, (sy / n) as f32)
	}

	/// Inclusive bounding box `(min_x, min_y, max_x, max_y)`.
	pub fn bounds(&self) -> (u32, u32, u32, u32) {
		self.pixels.iter().fold((u32::MAX, u32::MAX, 0, 0), |(x1, y1, x2, y2), &(x, y)| {
			(x1.min(x), y1.min(y), x2.max(x), y2.max(y))
		})
	}

	fn confidence(&self, rule: &MarkerRule) -> f32 {
		let color = self.color_score / self.area().max(1) as f32;
		let size = if rule.min_area == 0 {
			1.0
		} else {
			(self.area() as f32 / (2.0 * rule.min_area as f32)).min(1.0)
		};
		0.5 * (color + size)
	}
}

/// Detect every marker kind in `palette` on `frame`.
pub fn detect(frame: &Frame, palette: &Palette) -> Vec<Marker> {
	palette.rules.iter().flat_map(|rule| detect_rule(frame, rule)).collect()
}

/// Detect markers for a single rule, best candidates first.
pub fn detect_rule(frame: &Frame, rule: &MarkerRule) -> Vec<Marker> {
	let mut candidates: Vec<(Marker, Blob)> = find_blobs(frame, rule)
		.into_iter()
		.filter(|blob| rule.accepts_area(blob.area()))
		.filter_map(|blob| {
			let (px, py) = blob.centroid();
			let confidence = blob.confidence(rule);
			if confidence < rule.min_confidence {
				return None;
			}
			let marker = Marker {
				kind: rule.kind,
				px,
				py,
				confidence,
				area: blob.area(),
				facing: None,
			};
			Some((marker, blob))
		})
		.collect();

	candidates.sort_by(|(a, _), (b, _)| {
		b.confidence
			.total_cmp(&a.confidence)
			.then_with(|| b.area.cmp(&a.area))
	});

	if rule.exclusive && candidates.len() > 1 {
		tracing::debug!(kind = ?rule.kind, count = candidates.len(), "ambiguous exclusive marker; keeping best");
		candidates.truncate(1);
	}

	candidates
		.into_iter()
		.map(|(mut marker, blob)| {
			if let Some(orient) = &rule.orientation {
				marker.facing = orientation::infer_facing(frame, &blob, (marker.px, marker.py), orient);
				if marker.facing.is_none() {
					tracing::debug!(kind = ?rule.kind, "glyph orientation unreadable");
				}
			}
			marker
		})
		.collect()
}

/// Best marker of `kind`, if any.
pub fn find_marker(frame: &Frame, palette: &Palette, kind: MarkerKind) -> Option<Marker> {
	palette.rule(kind).and_then(|rule| detect_rule(frame, rule).into_iter().next())
}

fn find_blobs(frame: &Frame, rule: &MarkerRule) -> Vec<Blob> {
	if rule.colors.is_empty() || frame.width() == 0 || frame.height() == 0 {
		return vec![];
	}

	let mask = frame.mask(&rule.colors);
	if !mask.pixels().any(|p| p.0[0] > 0) {
		return vec![];
	}

	// Dilation joins pixels separated by compression noise; only the original
	// matches count toward a blob.
	let grouped = if rule.merge_distance > 0 {
		dilate(&mask, Norm::LInf, rule.merge_distance)
	} else {
		mask.clone()
	};
	let labels = connected_components(&grouped, Connectivity::Eight, Luma([0u8]));

	let mut blobs: BTreeMap<u32, Blob> = BTreeMap::new();
	for (x, y, p) in mask.enumerate_pixels() {
		if p.0[0] == 0 {
			continue;
		}
		let label = labels.get_pixel(x, y).0[0];
		let Some(color) = frame.pixel(x, y) else {
			continue;
		};
		let score = rule
			.colors
			.iter()
			.map(|r| r.closeness(color))
			.fold(0.0f32, f32::max);

		let blob = blobs.entry(label).or_default();
		blob.pixels.push((x, y));
		blob.color_score += score;
	}

	blobs.into_values().collect()
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::{Color, ColorRange, OrientationRule, ScreenRect};

	pub(crate) const BG: Color = Color::new(40, 60, 40);

	pub(crate) type Shape = Box<dyn Fn(u32, u32) -> bool>;

	pub(crate) fn disc(cx: f32, cy: f32, r: f32) -> Shape {
		Box::new(move |x, y| {
			let dx = x as f32 - cx;
			let dy = y as f32 - cy;
			dx * dx + dy * dy <= r * r
		})
	}

	pub(crate) fn paint(w: u32, h: u32, shapes: &[(Shape, Color)]) -> Frame {
		Frame::from_fn(ScreenRect::new(0, 0, w, h), |x, y| {
			shapes
				.iter()
				.find(|(inside, _)| inside(x, y))
				.map_or(BG, |(_, c)| *c)
		})
	}

	fn yellow() -> Color {
		Color::new(247, 255, 26)
	}

	fn palette() -> Palette {
		Palette {
			rules: vec![
				MarkerRule::new(MarkerKind::Player, vec![ColorRange::new(Color::WHITE, 29)], 20)
					.exclusive()
					.orientation(OrientationRule::default()),
				MarkerRule::new(MarkerKind::PoiTarget, vec![ColorRange::new(yellow(), 15)], 10).exclusive(),
				MarkerRule::new(MarkerKind::GenericObject, vec![ColorRange::new(Color::new(236, 60, 60), 20)], 5),
			],
		}
	}

	#[test]
	fn one_marker_per_kind() {
		let frame = paint(
			80,
			80,
			&[
				(disc(20.0, 20.0, 4.0), Color::WHITE),
				(disc(60.0, 30.0, 3.0), yellow()),
				(disc(40.0, 60.0, 2.0), Color::new(236, 60, 60)),
			],
		);

		let markers = detect(&frame, &palette());
		for kind in [MarkerKind::Player, MarkerKind::PoiTarget, MarkerKind::GenericObject] {
			let found: Vec<_> = markers.iter().filter(|m| m.kind == kind).collect();
			assert_eq!(found.len(), 1, "{kind:?}");
			assert!(found[0].confidence >= 0.3);
			assert!(frame.contains(found[0].px, found[0].py));
		}

		let target = markers.iter().find(|m| m.kind == MarkerKind::PoiTarget).unwrap();
		assert!((target.px - 60.0).abs() < 0.5 && (target.py - 30.0).abs() < 0.5);
	}

	#[test]
	fn empty_frame_yields_nothing() {
		let frame = paint(32, 32, &[]);
		assert!(detect(&frame, &palette()).is_empty());
		assert!(find_marker(&frame, &palette(), MarkerKind::Player).is_none());
	}

	#[test]
	fn single_pixel_noise_is_rejected() {
		let frame = Frame::from_fn(ScreenRect::new(0, 0, 32, 32), |x, y| {
			if (x * 7 + y * 3) % 11 == 0 && x % 5 == 0 { Color::WHITE } else { BG }
		});
		assert!(find_marker(&frame, &palette(), MarkerKind::Player).is_none());
	}

	#[test]
	fn gaps_within_merge_distance_join() {
		// Two halves of a square separated by a one-pixel seam.
		let rule = MarkerRule::new(MarkerKind::PoiTarget, vec![ColorRange::new(yellow(), 15)], 40).merge_distance(1);
		let frame = Frame::from_fn(ScreenRect::new(0, 0, 20, 20), |x, y| {
			if (4..12).contains(&y) && ((4..8).contains(&x) || (9..13).contains(&x)) { yellow() } else { BG }
		});
		let found = detect_rule(&frame, &rule);
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].area, 64);

		let split = detect_rule(&frame, &rule.clone().merge_distance(0));
		assert!(split.is_empty(), "each half is below min_area on its own");
	}

	#[test]
	fn exclusive_kinds_keep_the_largest() {
		let frame = paint(
			64,
			64,
			&[(disc(20.0, 20.0, 5.0), Color::WHITE), (disc(50.0, 50.0, 3.0), Color::WHITE)],
		);

		let players: Vec<_> = detect(&frame, &palette())
			.into_iter()
			.filter(|m| m.kind == MarkerKind::Player)
			.collect();
		assert_eq!(players.len(), 1);
		assert!((players[0].px - 20.0).abs() < 0.5);
	}

	#[test]
	fn non_exclusive_kinds_report_all() {
		let red = Color::new(236, 60, 60);
		let frame = paint(
			50,
			50,
			&[(disc(10.0, 10.0, 2.0), red), (disc(40.0, 10.0, 2.0), red), (disc(25.0, 40.0, 2.0), red)],
		);
		let objects = detect(&frame, &palette());
		assert_eq!(objects.iter().filter(|m| m.kind == MarkerKind::GenericObject).count(), 3);
	}

	#[test]
	fn oversized_blobs_are_rejected() {
		let rule = MarkerRule::new(MarkerKind::Player, vec![ColorRange::new(Color::WHITE, 29)], 10).max_area(50);
		let frame = paint(64, 64, &[(disc(30.0, 30.0, 10.0), Color::WHITE)]);
		assert!(detect_rule(&frame, &rule).is_empty());
	}
}
