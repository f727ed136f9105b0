use foundation::LngLat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Half-size of the pointer query box, in pixels.
pub const HOVER_FUZZ_PX: f64 = 8.0;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenBox {
    pub min: ScreenPoint,
    pub max: ScreenPoint,
}

impl ScreenBox {
    pub fn contains(&self, p: ScreenPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Box around the pointer used to query rendered features.
pub fn query_box(point: ScreenPoint, fuzz: f64) -> ScreenBox {
    ScreenBox {
        min: ScreenPoint::new(point.x - fuzz, point.y - fuzz),
        max: ScreenPoint::new(point.x + fuzz, point.y + fuzz),
    }
}

/// A rendered feature under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverCandidate {
    pub layer_id: String,
    pub feature_id: Option<Value>,
    pub properties: Map<String, Value>,
    /// Where the popup is anchored.
    pub anchor: LngLat,
    /// `anchor` projected to screen space.
    pub screen: ScreenPoint,
}

impl HoverCandidate {
    /// Builds a candidate from a rendered-feature JSON object
    /// (`{"layer": {"id": ..}, "id": .., "properties": {..}, "geometry": {..}}`).
    pub fn from_feature(feature: &Value, project: impl Fn(LngLat) -> ScreenPoint) -> Option<Self> {
        let layer_id = feature.get("layer")?.get("id")?.as_str()?.to_string();
        let anchor = anchor_for_geometry(feature.get("geometry")?)?;
        let properties = match feature.get("properties") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };
        Some(Self {
            layer_id,
            feature_id: feature.get("id").filter(|v| !v.is_null()).cloned(),
            properties,
            anchor,
            screen: project(anchor),
        })
    }
}

/// First position of a GeoJSON geometry: the point itself, or the first
/// vertex of a line, ring or member geometry.
pub fn anchor_for_geometry(geometry: &Value) -> Option<LngLat> {
    if let Some(members) = geometry.get("geometries").and_then(Value::as_array) {
        return members.iter().find_map(anchor_for_geometry);
    }
    let mut coords = geometry.get("coordinates")?;
    loop {
        let items = coords.as_array()?;
        match items.first()? {
            Value::Array(_) => coords = &items[0],
            first => {
                let lng = first.as_f64()?;
                let lat = items.get(1)?.as_f64()?;
                return Some(LngLat::new(lng, lat));
            }
        }
    }
}

/// Candidate closest to `point` on screen. Ties go to the earlier candidate.
pub fn closest<'a, I>(point: ScreenPoint, candidates: I) -> Option<&'a HoverCandidate>
where
    I: IntoIterator<Item = &'a HoverCandidate>,
{
    let mut best: Option<(&HoverCandidate, f64)> = None;
    for c in candidates {
        let d = point.distance(c.screen);
        if d.is_nan() {
            continue;
        }
        match best {
            Some((_, bd)) if bd <= d => {}
            _ => best = Some((c, d)),
        }
    }
    best.map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::{HoverCandidate, ScreenPoint, anchor_for_geometry, closest, query_box};
    use foundation::LngLat;
    use serde_json::{Map, json};

    fn cand(layer: &str, x: f64, y: f64) -> HoverCandidate {
        HoverCandidate {
            layer_id: layer.to_string(),
            feature_id: None,
            properties: Map::new(),
            anchor: LngLat::new(x, y),
            screen: ScreenPoint::new(x, y),
        }
    }

    #[test]
    fn anchors_on_first_vertex() {
        assert_eq!(
            anchor_for_geometry(&json!({"type": "Point", "coordinates": [13.4, 52.5]})),
            Some(LngLat::new(13.4, 52.5))
        );
        assert_eq!(
            anchor_for_geometry(&json!({"type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]]})),
            Some(LngLat::new(1.0, 2.0))
        );
        assert_eq!(
            anchor_for_geometry(&json!({
                "type": "Polygon",
                "coordinates": [[[5.0, 6.0], [7.0, 8.0], [5.0, 8.0], [5.0, 6.0]]]
            })),
            Some(LngLat::new(5.0, 6.0))
        );
        assert_eq!(
            anchor_for_geometry(&json!({
                "type": "GeometryCollection",
                "geometries": [{"type": "Point", "coordinates": [9.0, 10.0]}]
            })),
            Some(LngLat::new(9.0, 10.0))
        );
        assert_eq!(anchor_for_geometry(&json!({"type": "Point", "coordinates": []})), None);
    }

    #[test]
    fn closest_prefers_nearest_then_earliest() {
        let cs = vec![cand("a", 10.0, 0.0), cand("b", 3.0, 4.0), cand("c", -4.0, 3.0)];
        let hit = closest(ScreenPoint::new(0.0, 0.0), &cs).unwrap();
        assert_eq!(hit.layer_id, "b");
        assert!(closest(ScreenPoint::new(0.0, 0.0), &[]).is_none());
    }

    #[test]
    fn builds_candidate_from_rendered_feature() {
        let feature = json!({
            "id": 7,
            "layer": {"id": "points"},
            "properties": {"name": "Berlin"},
            "geometry": {"type": "Point", "coordinates": [13.4, 52.5]}
        });
        let c = HoverCandidate::from_feature(&feature, |p| ScreenPoint::new(p.lng * 10.0, p.lat * 10.0))
            .unwrap();
        assert_eq!(c.layer_id, "points");
        assert_eq!(c.feature_id, Some(json!(7)));
        assert_eq!(c.properties["name"], json!("Berlin"));
        assert_eq!(c.screen, ScreenPoint::new(134.0, 525.0));
    }

    #[test]
    fn query_box_is_centered() {
        let b = query_box(ScreenPoint::new(100.0, 50.0), 8.0);
        assert!(b.contains(ScreenPoint::new(92.0, 58.0)));
        assert!(!b.contains(ScreenPoint::new(91.0, 50.0)));
    }
}
