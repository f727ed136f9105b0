use serde::{Deserialize, Serialize};

/// Geographic position in degrees.
///
/// Serialized as a `[lng, lat]` pair, matching map style documents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}

/// Axis-aligned geographic box, serialized as `[[west, south], [east, north]]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[LngLat; 2]", into = "[LngLat; 2]")]
pub struct LngLatBounds {
    pub sw: LngLat,
    pub ne: LngLat,
}

impl LngLatBounds {
    pub fn new(sw: LngLat, ne: LngLat) -> Self {
        LngLatBounds { sw, ne }
    }

    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.sw.lng && p.lng <= self.ne.lng && p.lat >= self.sw.lat && p.lat <= self.ne.lat
    }
}

impl From<[LngLat; 2]> for LngLatBounds {
    fn from(b: [LngLat; 2]) -> Self {
        Self::new(b[0], b[1])
    }
}

impl From<LngLatBounds> for [LngLat; 2] {
    fn from(b: LngLatBounds) -> Self {
        [b.sw, b.ne]
    }
}
