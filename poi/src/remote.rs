//! Remote POI list and its on-disk cache.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::schema::{self, RemotePoi};
use crate::{AffineMap, Poi, PoiKind};

static NAMED: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^Athena\.Location\.POI\.Generic\.(?:EE\.)?\d+$").expect("regex"));
static LANDMARK: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^Athena\.Location\.UnNamedPOI\.(?:Landmark|GasStation)\.\d+$").expect("regex"));

/// Which remote entries are worth guiding to; the rest (spawn islands,
/// internal markers) are dropped.
pub fn classify(id: &str) -> Option<PoiKind> {
	if NAMED.is_match(id) {
		Some(PoiKind::Named)
	} else if LANDMARK.is_match(id) {
		Some(PoiKind::Landmark)
	} else {
		None
	}
}

pub fn fetch() -> Result<Vec<RemotePoi>> {
	let mut res = ureq::get(schema::URL)
		.query("language", "en")
		.call()
		.context("GET map POIs")?;
	let map = res
		.body_mut()
		.read_json::<schema::MapResponse>()
		.context("Decode map JSON")?;
	Ok(map.data.pois)
}

/// Keep classified entries and project them into map space.
pub fn convert(remote: &[RemotePoi], transform: &AffineMap, map: &str) -> Vec<Poi> {
	remote
		.iter()
		.filter_map(|r| {
			let kind = classify(&r.id)?;
			let name = r.name.trim();
			if name.is_empty() {
				return None;
			}
			let point = transform.apply(r.location.x, r.location.y);
			point.is_finite().then(|| Poi {
				name: name.to_owned(),
				point,
				kind,
				map: map.to_owned(),
			})
		})
		.collect()
}

pub fn default_cache_path() -> Option<PathBuf> {
	dirs::cache_dir().map(|p| p.join("mapcue").join("pois_cache.json"))
}

pub fn load_cache(path: &Path) -> Result<Vec<Poi>> {
	let file = File::open(path).with_context(|| format!("Open cache {}", path.display()))?;
	let reader = BufReader::new(file);
	serde_json::from_reader(reader).with_context(|| format!("Parse cache {}", path.display()))
}

pub fn save_cache(path: &Path, pois: &[Poi]) -> Result<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).with_context(|| format!("Create cache dir {}", parent.display()))?;
	}

	let tmp = path.with_extension("json.tmp");
	let file = File::create(&tmp).with_context(|| format!("Write cache temp {}", tmp.display()))?;
	let mut writer = BufWriter::new(file);
	serde_json::to_writer(&mut writer, pois).context("Serialize cache")?;
	writer.flush().context("Flush cache")?;
	drop(writer);

	// Windows refuses to rename over an existing file.
	if std::fs::rename(&tmp, path).is_err() {
		let _ = std::fs::remove_file(path);
		std::fs::rename(&tmp, path).with_context(|| format!("Persist cache {}", path.display()))?;
	}
	Ok(())
}
