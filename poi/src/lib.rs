//! Points of interest: where named places are in map space.
//!
//! Sources, in order of preference: the remote POI list (projected through a
//! world → map fit from the local reference file), its cached copy, and the
//! local `pois.txt`. User-placed custom POIs are always added on top.

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result, bail};
use nav::{MapSpacePoint, NamedPoint, TargetProvider};
use serde::{Deserialize, Serialize};

mod affine;
pub use affine::AffineMap;
pub mod file;
pub mod remote;
mod schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoiKind {
	Named,
	Landmark,
	Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
	pub name: String,
	pub point: MapSpacePoint,
	pub kind: PoiKind,
	pub map: String,
}

impl Poi {
	pub fn new(name: impl Into<String>, point: MapSpacePoint, kind: PoiKind) -> Self {
		Self {
			name: name.into(),
			point,
			kind,
			map: file::DEFAULT_MAP.to_owned(),
		}
	}
}

/// Where to load POIs from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiSources {
	pub pois_file: Option<PathBuf>,
	pub custom_file: Option<PathBuf>,
	pub fetch_remote: bool,
	/// `None` uses the user cache directory.
	pub cache_file: Option<PathBuf>,
	/// Custom POIs tagged with another map are ignored.
	pub map: String,
}

impl Default for PoiSources {
	fn default() -> Self {
		Self {
			pois_file: Some(PathBuf::from("pois.txt")),
			custom_file: Some(PathBuf::from("CUSTOM_POI.txt")),
			fetch_remote: false,
			cache_file: None,
			map: file::DEFAULT_MAP.to_owned(),
		}
	}
}

impl PoiSources {
	fn cache_path(&self) -> Option<PathBuf> {
		self.cache_file.clone().or_else(remote::default_cache_path)
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiSet {
	pois: Vec<Poi>,
}

impl PoiSet {
	pub fn new(pois: Vec<Poi>) -> Self {
		Self { pois }
	}

	pub fn len(&self) -> usize {
		self.pois.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pois.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Poi> {
		self.pois.iter()
	}

	pub fn names(&self) -> Vec<String> {
		self.pois.iter().map(|p| p.name.clone()).collect()
	}

	pub fn push(&mut self, poi: Poi) {
		self.pois.push(poi);
	}

	/// Case-insensitive lookup: exact name, then prefix, then the closest
	/// name within a small edit distance.
	pub fn find(&self, query: &str) -> Option<&Poi> {
		let query = query.trim().to_lowercase();
		if query.is_empty() {
			return None;
		}
		let lowered: Vec<String> = self.pois.iter().map(|p| p.name.to_lowercase()).collect();

		if let Some(i) = lowered.iter().position(|n| *n == query) {
			return Some(&self.pois[i]);
		}
		if let Some(i) = lowered
			.iter()
			.enumerate()
			.filter(|(_, n)| n.starts_with(&query))
			.min_by_key(|(_, n)| n.len())
			.map(|(i, _)| i)
		{
			return Some(&self.pois[i]);
		}

		let limit = (query.chars().count() / 4).max(2);
		let (i, dist) = lowered
			.iter()
			.enumerate()
			.map(|(i, n)| (i, levenshtein::levenshtein(&query, n)))
			.min_by_key(|&(_, d)| d)?;
		(dist <= limit).then(|| &self.pois[i])
	}

	pub fn nearest(&self, point: MapSpacePoint) -> Option<&Poi> {
		self.pois
			.iter()
			.filter(|p| p.point.is_finite())
			.min_by(|a, b| point.distance(a.point).total_cmp(&point.distance(b.point)))
	}

	fn load_base(sources: &PoiSources) -> Result<Self> {
		let local = match &sources.pois_file {
			Some(path) => file::load_pois(path)?,
			None => file::PoiFile::default(),
		};
		if !sources.fetch_remote {
			return Ok(Self::new(local.pois));
		}

		let fetched = remote::fetch().and_then(|list| {
			let Some(transform) = AffineMap::fit(&local.reference_pairs) else {
				bail!(
					"need at least 3 non-collinear world reference points, have {}",
					local.reference_pairs.len()
				);
			};
			Ok(remote::convert(&list, &transform, &sources.map))
		});
		match fetched {
			Ok(pois) if !pois.is_empty() => {
				if let Some(path) = sources.cache_path() {
					if let Err(err) = remote::save_cache(&path, &pois) {
						tracing::warn!("failed to cache POIs: {err:#}");
					}
				}
				Ok(Self::new(pois))
			}
			other => {
				let err = match other {
					Err(err) => err,
					Ok(_) => anyhow::anyhow!("remote POI list is empty"),
				};
				let cached = sources.cache_path().map(|p| remote::load_cache(&p));
				match cached {
					Some(Ok(pois)) => {
						tracing::warn!("using cached POIs: {err:#}");
						Ok(Self::new(pois))
					}
					_ => {
						tracing::warn!("using local POI file: {err:#}");
						Ok(Self::new(local.pois))
					}
				}
			}
		}
	}

	/// Load from `sources`; errors only when a configured local file is unreadable.
	pub fn try_populated(sources: &PoiSources) -> Result<Self> {
		let mut set = Self::load_base(sources)?;
		if let Some(path) = &sources.custom_file {
			let custom = file::load_custom(path).context("Load custom POIs")?;
			set.pois.extend(custom.into_iter().filter(|p| p.map == sources.map));
		}
		tracing::info!(count = set.len(), "POIs loaded");
		Ok(set)
	}

	/// Never errors (empty set on failure).
	pub fn populated(sources: &PoiSources) -> Self {
		Self::try_populated(sources).unwrap_or_else(|err| {
			tracing::warn!("failed to load POIs: {err:#}");
			Self::default()
		})
	}
}

impl TargetProvider for PoiSet {
	fn get_target(&self, name: &str) -> Option<NamedPoint> {
		self.find(name).map(|p| NamedPoint {
			name: p.name.clone(),
			point: p.point,
		})
	}
}

/// A [`PoiSet`] that can be swapped while locators hold on to it.
#[derive(Debug, Default)]
pub struct Catalog {
	inner: RwLock<PoiSet>,
}

impl Catalog {
	pub fn new(set: PoiSet) -> Self {
		Self { inner: RwLock::new(set) }
	}

	pub fn replace(&self, set: PoiSet) {
		*self.inner.write().unwrap_or_else(PoisonError::into_inner) = set;
	}

	pub fn snapshot(&self) -> PoiSet {
		self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	pub fn add(&self, poi: Poi) {
		self.inner.write().unwrap_or_else(PoisonError::into_inner).push(poi);
	}

	pub fn nearest(&self, point: MapSpacePoint) -> Option<Poi> {
		self.inner
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.nearest(point)
			.cloned()
	}
}

impl TargetProvider for Catalog {
	fn get_target(&self, name: &str) -> Option<NamedPoint> {
		self.inner.read().unwrap_or_else(PoisonError::into_inner).get_target(name)
	}
}
