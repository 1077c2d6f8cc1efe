//! Plain-text POI files.
//!
//! `pois.txt`: `name|map_x,map_y` or `name|map_x,map_y|world_x,world_y`.
//! Lines carrying world coordinates double as reference pairs for the
//! world → map fit.
//!
//! Custom POIs: `name,x,y[,map]`, one per line; the map defaults to `main`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use nav::MapSpacePoint;

use crate::{Poi, PoiKind};

pub const DEFAULT_MAP: &str = "main";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiFile {
	pub pois: Vec<Poi>,
	/// `(world, map)` pairs for [`AffineMap::fit`](crate::AffineMap::fit).
	pub reference_pairs: Vec<((f64, f64), (f64, f64))>,
}

fn pair(text: &str) -> Option<(f64, f64)> {
	let (x, y) = text.split_once(',')?;
	let x: f64 = x.trim().parse().ok()?;
	let y: f64 = y.trim().parse().ok()?;
	(x.is_finite() && y.is_finite()).then_some((x, y))
}

pub fn parse_pois(text: &str) -> PoiFile {
	let mut out = PoiFile::default();
	for (no, line) in text.lines().enumerate() {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		let parts: Vec<&str> = line.split('|').map(str::trim).collect();
		let parsed = match parts.as_slice() {
			[name, map] if !name.is_empty() => pair(map).map(|m| (name, m, None)),
			[name, map, world] if !name.is_empty() => pair(map).zip(pair(world)).map(|(m, w)| (name, m, Some(w))),
			_ => None,
		};
		let Some((name, map, world)) = parsed else {
			tracing::warn!(line = no + 1, text = line, "skipping invalid POI line");
			continue;
		};
		if let Some(world) = world {
			out.reference_pairs.push((world, map));
		}
		out.pois.push(Poi {
			name: (*name).to_owned(),
			point: MapSpacePoint::new(map.0 as f32, map.1 as f32),
			kind: PoiKind::Named,
			map: DEFAULT_MAP.to_owned(),
		});
	}
	out
}

pub fn parse_custom_line(line: &str) -> Option<Poi> {
	let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();
	if parts.len() < 3 || parts[0].is_empty() {
		return None;
	}
	let x: f32 = parts[1].parse().ok()?;
	let y: f32 = parts[2].parse().ok()?;
	if !x.is_finite() || !y.is_finite() {
		return None;
	}
	let map = parts.get(3).filter(|m| !m.is_empty()).copied().unwrap_or(DEFAULT_MAP);
	Some(Poi {
		name: parts[0].to_owned(),
		point: MapSpacePoint::new(x, y),
		kind: PoiKind::Custom,
		map: map.to_owned(),
	})
}

pub fn parse_custom(text: &str) -> Vec<Poi> {
	text.lines()
		.filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
		.filter_map(|l| {
			let poi = parse_custom_line(l);
			if poi.is_none() {
				tracing::warn!(text = l, "skipping invalid custom POI line");
			}
			poi
		})
		.collect()
}

/// Custom POI line for `poi`, as written by [`append_custom`].
pub fn format_custom(poi: &Poi) -> String {
	format!("{},{},{},{}", poi.name.replace(',', " "), poi.point.x.round(), poi.point.y.round(), poi.map)
}

/// Load `path`; a missing file is an empty list.
pub fn load_pois(path: &Path) -> Result<PoiFile> {
	if !path.exists() {
		tracing::debug!(path = %path.display(), "no POI file");
		return Ok(PoiFile::default());
	}
	let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
	Ok(parse_pois(&text))
}

pub fn load_custom(path: &Path) -> Result<Vec<Poi>> {
	if !path.exists() {
		return Ok(Vec::new());
	}
	let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
	Ok(parse_custom(&text))
}

pub fn append_custom(path: &Path, poi: &Poi) -> Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
	}
	let mut file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(path)
		.with_context(|| format!("open {}", path.display()))?;
	writeln!(file, "{}", format_custom(poi)).with_context(|| format!("write {}", path.display()))?;
	Ok(())
}
