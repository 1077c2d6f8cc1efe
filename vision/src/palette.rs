//! Declarative marker rules.
//!
//! Each [`MarkerRule`] says which colors make up a marker kind, how large a
//! blob must be, and (for directional glyphs) how to read its orientation.
//! The detector consumes the table generically; there is no per-kind code.

use serde::{Deserialize, Serialize};

use crate::{Color, ColorRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerKind {
	/// The player's own directional glyph.
	Player,
	/// The destination marker placed on the map.
	PoiTarget,
	/// Any other palette-matched icon (chests, vehicles, ...).
	GenericObject,
}

impl MarkerKind {
	pub fn label(&self) -> &'static str {
		match self {
			Self::Player => "player",
			Self::PoiTarget => "map marker",
			Self::GenericObject => "object",
		}
	}
}

/// How to read a facing angle from a glyph blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum OrientationRule {
	/// The apex is the cluster of blob pixels farthest from the centroid.
	///
	/// Pixels at `>= tip_fraction` of the maximum radius form the tip; their
	/// directions must agree with a mean resultant length of at least
	/// `min_coherence`, otherwise the glyph is treated as unreadable.
	Tip { tip_fraction: f32, min_coherence: f32 },
	/// The glyph has a differently colored nose.
	///
	/// Accent pixels are searched in the blob's bounding box grown by
	/// `search_margin`; fewer than `min_pixels` means unreadable.
	Accent {
		colors: Vec<ColorRange>,
		search_margin: u32,
		min_pixels: u32,
	},
}

impl Default for OrientationRule {
	fn default() -> Self {
		Self::Tip {
			tip_fraction: 0.85,
			min_coherence: 0.9,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRule {
	pub kind: MarkerKind,
	pub colors: Vec<ColorRange>,
	/// Blobs with fewer matching pixels are noise.
	pub min_area: u32,
	#[serde(default)]
	pub max_area: Option<u32>,
	/// Gaps up to this many pixels (L∞) still join one blob.
	#[serde(default = "default_merge_distance")]
	pub merge_distance: u8,
	/// Only the best candidate of an exclusive kind is reported.
	#[serde(default)]
	pub exclusive: bool,
	#[serde(default = "default_min_confidence")]
	pub min_confidence: f32,
	#[serde(default)]
	pub orientation: Option<OrientationRule>,
}

fn default_merge_distance() -> u8 {
	1
}

fn default_min_confidence() -> f32 {
	0.3
}

impl MarkerRule {
	pub fn new(kind: MarkerKind, colors: Vec<ColorRange>, min_area: u32) -> Self {
		Self {
			kind,
			colors,
			min_area,
			max_area: None,
			merge_distance: default_merge_distance(),
			exclusive: false,
			min_confidence: default_min_confidence(),
			orientation: None,
		}
	}

	pub fn exclusive(mut self) -> Self {
		self.exclusive = true;
		self
	}

	pub fn max_area(mut self, max_area: u32) -> Self {
		self.max_area = Some(max_area);
		self
	}

	pub fn merge_distance(mut self, distance: u8) -> Self {
		self.merge_distance = distance;
		self
	}

	pub fn orientation(mut self, rule: OrientationRule) -> Self {
		self.orientation = Some(rule);
		self
	}

	pub fn accepts_area(&self, area: u32) -> bool {
		area >= self.min_area && self.max_area.is_none_or(|max| area <= max)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
	pub rules: Vec<MarkerRule>,
}

impl Default for Palette {
	/// Rules tuned for the 1080p full-screen map.
	///
	/// The player arrow is near-white (the minimap arrow is dimmer, hence the
	/// wide tolerance), the placed map marker is the UI yellow.
	fn default() -> Self {
		Self {
			rules: vec![
				MarkerRule::new(MarkerKind::Player, vec![ColorRange::new(Color::WHITE, 29)], 40)
					.max_area(120)
					.exclusive()
					.orientation(OrientationRule::default()),
				MarkerRule::new(MarkerKind::PoiTarget, vec![ColorRange::new(Color::new(247, 255, 26), 15)], 20)
					.max_area(400)
					.exclusive(),
				MarkerRule::new(
					MarkerKind::GenericObject,
					vec![
						ColorRange::new(Color::new(236, 60, 60), 20),
						ColorRange::new(Color::new(90, 170, 255), 20),
					],
					12,
				)
				.max_area(200),
			],
		}
	}
}

impl Palette {
	pub fn rule(&self, kind: MarkerKind) -> Option<&MarkerRule> {
		self.rules.iter().find(|r| r.kind == kind)
	}
}
