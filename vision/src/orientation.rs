//! Facing inference for directional glyphs.

use crate::detect::Blob;
use crate::{Frame, OrientationRule};

/// Normalize an angle into `[0, 360)`.
pub fn normalize_degrees(deg: f32) -> f32 {
	let d = deg.rem_euclid(360.0);
	// rem_euclid can round up to exactly 360.0 for tiny negative inputs.
	if d >= 360.0 { 0.0 } else { d }
}

/// Compass heading of a screen-space vector (y grows downwards):
/// 0 = up/north, clockwise positive.
pub fn heading_from_vector(dx: f32, dy: f32) -> f32 {
	normalize_degrees(dx.atan2(-dy).to_degrees())
}

pub(crate) fn infer_facing(frame: &Frame, blob: &Blob, centroid: (f32, f32), rule: &OrientationRule) -> Option<f32> {
	match rule {
		OrientationRule::Tip {
			tip_fraction,
			min_coherence,
		} => tip_facing(blob, centroid, *tip_fraction, *min_coherence),
		OrientationRule::Accent {
			colors,
			search_margin,
			min_pixels,
		} => {
			let (x1, y1, x2, y2) = blob.bounds();
			let x = x1.saturating_sub(*search_margin);
			let y = y1.saturating_sub(*search_margin);
			let w = x2.saturating_add(*search_margin).saturating_add(1).min(frame.width()) - x;
			let h = y2.saturating_add(*search_margin).saturating_add(1).min(frame.height()) - y;

			let (mut sx, mut sy, mut n) = (0.0f32, 0.0f32, 0u32);
			for (ax, ay, color) in frame.as_image().sub_image(x, y, w, h).pixels() {
				if colors.iter().any(|r| r.contains(color)) {
					sx += (x + ax) as f32;
					sy += (y + ay) as f32;
					n += 1;
				}
			}
			if n < (*min_pixels).max(1) {
				return None;
			}
			let (dx, dy) = (sx / n as f32 - centroid.0, sy / n as f32 - centroid.1);
			if dx.hypot(dy) < 0.5 {
				return None;
			}
			Some(heading_from_vector(dx, dy))
		}
	}
}

fn tip_facing(blob: &Blob, (cx, cy): (f32, f32), tip_fraction: f32, min_coherence: f32) -> Option<f32> {
	let r_max = blob
		.pixels
		.iter()
		.map(|&(x, y)| (x as f32 - cx).hypot(y as f32 - cy))
		.fold(0.0f32, f32::max);
	if r_max < 1.0 {
		return None;
	}

	let cutoff = r_max * tip_fraction;
	let (mut ux, mut uy, mut tx, mut ty, mut n) = (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0u32);
	for &(x, y) in &blob.pixels {
		let (dx, dy) = (x as f32 - cx, y as f32 - cy);
		let r = dx.hypot(dy);
		if r < cutoff || r == 0.0 {
			continue;
		}
		ux += dx / r;
		uy += dy / r;
		tx += dx;
		ty += dy;
		n += 1;
	}
	if n == 0 {
		return None;
	}

	// Several equally far vertices (or a round blob) point in different
	// directions and cancel out.
	let coherence = ux.hypot(uy) / n as f32;
	if coherence < min_coherence {
		return None;
	}
	Some(heading_from_vector(tx, ty))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::detect::tests::{disc, paint};
	use crate::{Color, ColorRange, MarkerKind, MarkerRule, ScreenRect, detect_rule};

	fn angle_diff(a: f32, b: f32) -> f32 {
		let d = (a - b).rem_euclid(360.0);
		d.min(360.0 - d)
	}

	fn player_rule(orientation: OrientationRule) -> MarkerRule {
		MarkerRule::new(MarkerKind::Player, vec![ColorRange::new(Color::WHITE, 29)], 20)
			.max_area(400)
			.exclusive()
			.orientation(orientation)
	}

	/// Isosceles arrow centred on (cx, cy) pointing towards `heading`.
	fn arrow(cx: f32, cy: f32, heading: f32) -> impl Fn(u32, u32) -> bool {
		let rad = heading.to_radians();
		let (fx, fy) = (rad.sin(), -rad.cos());
		let (px, py) = (-fy, fx);
		let apex = (cx + 14.0 * fx, cy + 14.0 * fy);
		let b1 = (cx - 5.0 * fx + 7.0 * px, cy - 5.0 * fy + 7.0 * py);
		let b2 = (cx - 5.0 * fx - 7.0 * px, cy - 5.0 * fy - 7.0 * py);
		move |x, y| {
			let p = (x as f32, y as f32);
			let side = |a: (f32, f32), b: (f32, f32)| (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
			let (d1, d2, d3) = (side(apex, b1), side(b1, b2), side(b2, apex));
			let neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
			let pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
			!(neg && pos)
		}
	}

	#[test]
	fn heading_convention() {
		assert_eq!(heading_from_vector(0.0, -1.0), 0.0);
		assert!((heading_from_vector(1.0, 0.0) - 90.0).abs() < 1e-4);
		assert!((heading_from_vector(0.0, 1.0) - 180.0).abs() < 1e-4);
		assert!((heading_from_vector(-1.0, 0.0) - 270.0).abs() < 1e-4);
		assert_eq!(normalize_degrees(-0.0), 0.0);
		assert_eq!(normalize_degrees(720.0), 0.0);
		assert!((normalize_degrees(-90.0) - 270.0).abs() < 1e-4);
	}

	#[test]
	fn tip_reads_arrow_heading() {
		for heading in [0.0f32, 45.0, 90.0, 135.0, 200.0, 315.0] {
			let shape = arrow(32.0, 32.0, heading);
			let frame = Frame::from_fn(ScreenRect::new(0, 0, 64, 64), |x, y| {
				if shape(x, y) { Color::WHITE } else { Color::BLACK }
			});
			let found = detect_rule(&frame, &player_rule(OrientationRule::default()));
			assert_eq!(found.len(), 1);
			let facing = found[0].facing.expect("arrow orientation readable");
			assert!(angle_diff(facing, heading) < 8.0, "heading {heading} read as {facing}");
		}
	}

	#[test]
	fn round_blob_has_no_facing() {
		let frame = paint(40, 40, &[(disc(20.0, 20.0, 6.0), Color::WHITE)]);
		let found = detect_rule(&frame, &player_rule(OrientationRule::default()));
		assert_eq!(found.len(), 1, "position is still reported");
		assert_eq!(found[0].facing, None);
	}

	#[test]
	fn accent_points_from_body_to_nose() {
		let red = Color::new(255, 40, 40);
		let frame = paint(
			40,
			40,
			&[(disc(20.0, 12.0, 2.0), red), (disc(20.0, 20.0, 6.0), Color::WHITE)],
		);
		let rule = player_rule(OrientationRule::Accent {
			colors: vec![ColorRange::new(red, 20)],
			search_margin: 4,
			min_pixels: 3,
		});
		let found = detect_rule(&frame, &rule);
		assert_eq!(found.len(), 1);
		let facing = found[0].facing.expect("accent found");
		assert!(angle_diff(facing, 0.0) < 3.0, "read {facing}");
	}

	#[test]
	fn huge_search_margin_covers_the_frame() {
		let red = Color::new(255, 40, 40);
		let frame = paint(
			40,
			40,
			&[(disc(30.0, 20.0, 2.0), red), (disc(20.0, 20.0, 6.0), Color::WHITE)],
		);
		let rule = player_rule(OrientationRule::Accent {
			colors: vec![ColorRange::new(red, 20)],
			search_margin: u32::MAX,
			min_pixels: 3,
		});
		let facing = detect_rule(&frame, &rule)[0].facing.expect("accent found");
		assert!(angle_diff(facing, 90.0) < 3.0, "read {facing}");
	}

	#[test]
	fn missing_accent_has_no_facing() {
		let frame = paint(40, 40, &[(disc(20.0, 20.0, 6.0), Color::WHITE)]);
		let rule = player_rule(OrientationRule::Accent {
			colors: vec![ColorRange::new(Color::new(255, 40, 40), 20)],
			search_margin: 4,
			min_pixels: 3,
		});
		assert_eq!(detect_rule(&frame, &rule)[0].facing, None);
	}
}
