use serde::Deserialize;

pub const URL: &str = "https://fortnite-api.com/v1/map";

#[derive(Deserialize)]
pub struct MapResponse {
	pub data: MapData,
}

#[derive(Deserialize)]
pub struct MapData {
	#[serde(default)]
	pub pois: Vec<RemotePoi>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePoi {
	/// Game path, e.g. `Athena.Location.POI.Generic.07`.
	pub id: String,
	pub name: String,
	pub location: Location,
}

/// World coordinates; `z` is height and ignored.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Location {
	pub x: f64,
	pub y: f64,
	#[serde(default)]
	pub z: f64,
}
