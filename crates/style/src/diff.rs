//! Minimal operation planning between two style snapshots.
//!
//! Ordering contract for the produced ops:
//! 1. `SetStyle` (basemap change only; the rest is then planned from empty)
//! 2. source adds and in-place updates
//! 3. hover/click unbinds and removals of dropped or re-created layers
//! 4. source removals
//! 5. layer adds and moves, walked from the top of the target list down
//! 6. leaf property updates of kept layers, in target order
//! 7. hover/click (re)binds, in target order

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::error::ConfigurationError;
use crate::model::{BACKGROUND_LAYER_TYPE, CameraState, LayerDef, StyleState};
use crate::ops::StyleOp;

/// Checks the layer/source references of `state`.
pub fn validate(state: &StyleState) -> Result<(), ConfigurationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for layer in &state.layers {
        if !seen.insert(layer.id.as_str()) {
            return Err(ConfigurationError::DuplicateLayerId {
                layer: layer.id.clone(),
            });
        }
        match &layer.source {
            Some(source_id) if !state.sources.contains(source_id) => {
                return Err(ConfigurationError::DanglingSource {
                    layer: layer.id.clone(),
                    source_id: source_id.clone(),
                });
            }
            None if layer.kind != BACKGROUND_LAYER_TYPE => {
                return Err(ConfigurationError::LayerWithoutSource {
                    layer: layer.id.clone(),
                    kind: layer.kind.clone(),
                });
            }
            _ => {}
        }
    }
    if let Some(hover) = &state.hover_layer
        && state.layers.get(hover).is_none()
    {
        return Err(ConfigurationError::UnknownHoverLayer {
            layer: hover.clone(),
        });
    }
    Ok(())
}

/// Ops that turn a map showing `prev` into one showing `next`.
///
/// `next` is validated first; an invalid `next` yields no ops at all.
pub fn plan(prev: &StyleState, next: &StyleState) -> Result<Vec<StyleOp>, ConfigurationError> {
    validate(next)?;

    let mut ops = Vec::new();
    let reset;
    let prev = if prev.basemap != next.basemap {
        ops.push(StyleOp::SetStyle {
            basemap: next.basemap.clone(),
        });
        reset = StyleState::empty(next.basemap.clone());
        &reset
    } else {
        prev
    };

    plan_sources_added(prev, next, &mut ops);
    let recreated = plan_layers_removed(prev, next, &mut ops);
    plan_sources_removed(prev, next, &mut ops);
    plan_layer_order(prev, next, &recreated, &mut ops);
    plan_layer_properties(prev, next, &recreated, &mut ops);
    plan_bindings(prev, next, &recreated, &mut ops);

    debug!(ops = ops.len(), "planned style update");
    Ok(ops)
}

/// One op per camera field that differs.
pub fn diff_camera(prev: &CameraState, next: &CameraState) -> Vec<StyleOp> {
    let mut ops = Vec::new();
    if prev.max_bounds != next.max_bounds {
        ops.push(StyleOp::SetMaxBounds {
            bounds: next.max_bounds,
        });
    }
    if prev.center != next.center {
        ops.push(StyleOp::SetCenter {
            center: next.center,
        });
    }
    if prev.zoom != next.zoom {
        ops.push(StyleOp::SetZoom { zoom: next.zoom });
    }
    if prev.bearing != next.bearing {
        ops.push(StyleOp::SetBearing {
            bearing: next.bearing,
        });
    }
    if prev.pitch != next.pitch {
        ops.push(StyleOp::SetPitch { pitch: next.pitch });
    }
    ops
}

fn plan_sources_added(prev: &StyleState, next: &StyleState, ops: &mut Vec<StyleOp>) {
    for (id, source) in next.sources.iter() {
        match prev.sources.get(id) {
            None => ops.push(StyleOp::AddSource {
                id: id.to_string(),
                source: source.clone(),
            }),
            Some(old) if old != source => ops.push(StyleOp::UpdateSource {
                id: id.to_string(),
                source: source.clone(),
            }),
            Some(_) => {}
        }
    }
}

/// A layer's type and source binding cannot change in place.
fn needs_recreate(old: &LayerDef, new: &LayerDef) -> bool {
    old.kind != new.kind || old.source != new.source || old.source_layer != new.source_layer
}

/// Removes dropped layers and layers that must be re-created.
///
/// Returns the ids of re-created layers; they are added back by
/// [`plan_layer_order`].
fn plan_layers_removed(
    prev: &StyleState,
    next: &StyleState,
    ops: &mut Vec<StyleOp>,
) -> HashSet<String> {
    let mut recreated = HashSet::new();
    for old in &prev.layers {
        let remove = match next.layers.get(&old.id) {
            None => true,
            Some(new) if needs_recreate(old, new) => {
                recreated.insert(old.id.clone());
                true
            }
            Some(_) => false,
        };
        if !remove {
            continue;
        }
        if prev.hover_template(old).is_some() {
            ops.push(StyleOp::UnbindHover {
                layer: old.id.clone(),
            });
        }
        if old.send_click {
            ops.push(StyleOp::UnbindClick {
                layer: old.id.clone(),
            });
        }
        ops.push(StyleOp::RemoveLayer { id: old.id.clone() });
    }
    recreated
}

fn plan_sources_removed(prev: &StyleState, next: &StyleState, ops: &mut Vec<StyleOp>) {
    for id in prev.sources.ids() {
        if !next.sources.contains(id) {
            ops.push(StyleOp::RemoveSource { id: id.to_string() });
        }
    }
}

/// Adds new layers and moves survivors so the live order matches `next`.
///
/// Survivors forming the longest run already in target order stay put. The
/// target list is walked from the top down so that each layer can be placed
/// directly below the one that follows it.
fn plan_layer_order(
    prev: &StyleState,
    next: &StyleState,
    recreated: &HashSet<String>,
    ops: &mut Vec<StyleOp>,
) {
    let target_index: HashMap<&str, usize> = next
        .layers
        .iter()
        .enumerate()
        .map(|(i, l)| (l.id.as_str(), i))
        .collect();

    // Survivors in live order, expressed as target positions.
    let live: Vec<usize> = prev
        .layers
        .iter()
        .filter(|l| !recreated.contains(&l.id))
        .filter_map(|l| target_index.get(l.id.as_str()).copied())
        .collect();
    let survivors: HashSet<usize> = live.iter().copied().collect();
    let stay: HashSet<usize> = longest_increasing_subsequence(&live)
        .into_iter()
        .collect();

    let mut above: Option<String> = None;
    for (i, layer) in next.layers.iter().enumerate().rev() {
        if !survivors.contains(&i) {
            ops.push(StyleOp::AddLayer {
                layer: layer.clone(),
                before: above.clone(),
            });
        } else if !stay.contains(&i) {
            ops.push(StyleOp::MoveLayer {
                id: layer.id.clone(),
                before: above.clone(),
            });
        }
        above = Some(layer.id.clone());
    }
}

fn plan_layer_properties(
    prev: &StyleState,
    next: &StyleState,
    recreated: &HashSet<String>,
    ops: &mut Vec<StyleOp>,
) {
    for new in &next.layers {
        if recreated.contains(&new.id) {
            continue;
        }
        let Some(old) = prev.layers.get(&new.id) else {
            continue;
        };

        diff_properties(&old.paint, &new.paint, |name, value| {
            ops.push(StyleOp::SetPaintProperty {
                layer: new.id.clone(),
                name,
                value,
            })
        });
        diff_properties(&old.layout, &new.layout, |name, value| {
            ops.push(StyleOp::SetLayoutProperty {
                layer: new.id.clone(),
                name,
                value,
            })
        });
        if old.filter != new.filter {
            ops.push(StyleOp::SetFilter {
                layer: new.id.clone(),
                filter: new.filter.clone(),
            });
        }
        if old.minzoom != new.minzoom || old.maxzoom != new.maxzoom {
            ops.push(StyleOp::SetZoomRange {
                layer: new.id.clone(),
                minzoom: new.minzoom,
                maxzoom: new.maxzoom,
            });
        }
    }
}

fn diff_properties(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
    mut emit: impl FnMut(String, Option<Value>),
) {
    for (name, value) in new {
        if old.get(name) != Some(value) {
            emit(name.clone(), Some(value.clone()));
        }
    }
    for name in old.keys() {
        if !new.contains_key(name) {
            emit(name.clone(), None);
        }
    }
}

fn plan_bindings(
    prev: &StyleState,
    next: &StyleState,
    recreated: &HashSet<String>,
    ops: &mut Vec<StyleOp>,
) {
    for new in &next.layers {
        // Layers added or re-created in this plan start unbound.
        let old = if recreated.contains(&new.id) {
            None
        } else {
            prev.layers.get(&new.id)
        };

        let was = old.and_then(|o| prev.hover_template(o));
        match (was, next.hover_template(new)) {
            (None, Some(_)) => ops.push(StyleOp::BindHover {
                layer: new.id.clone(),
            }),
            (Some(a), Some(b)) if a != b => ops.push(StyleOp::BindHover {
                layer: new.id.clone(),
            }),
            (Some(_), None) => ops.push(StyleOp::UnbindHover {
                layer: new.id.clone(),
            }),
            _ => {}
        }

        let was_click = old.is_some_and(|o| o.send_click);
        match (was_click, new.send_click) {
            (false, true) => ops.push(StyleOp::BindClick {
                layer: new.id.clone(),
            }),
            (true, false) => ops.push(StyleOp::UnbindClick {
                layer: new.id.clone(),
            }),
            _ => {}
        }
    }
}

/// Values of one longest strictly increasing subsequence of `seq`.
fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k]: index into `seq` of the smallest tail of an increasing run of length k+1.
    let mut tails: Vec<usize> = Vec::new();
    let mut prev_of: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &v) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < v);
        if k > 0 {
            prev_of[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        out.push(seq[i]);
        cur = prev_of[i];
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::{diff_camera, longest_increasing_subsequence, plan, validate};
    use crate::error::ConfigurationError;
    use crate::model::{Basemap, CameraState, LayerDef, LayerList, SourceDef, SourceSet, StyleState};
    use crate::ops::StyleOp;
    use foundation::LngLat;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn point_source(lng: f64, lat: f64) -> SourceDef {
        SourceDef::geojson(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [lng, lat]},
                "properties": {"name": "City"}
            }]
        }))
    }

    fn state(sources: &[(&str, SourceDef)], layers: Vec<LayerDef>) -> StyleState {
        let mut set = SourceSet::new();
        for (id, def) in sources {
            set.insert(*id, def.clone());
        }
        StyleState {
            sources: set,
            layers: LayerList::from(layers),
            ..StyleState::default()
        }
    }

    fn points_layer() -> LayerDef {
        LayerDef::new("points", "circle", "my-points")
            .with_paint("circle-radius", json!(8))
            .with_paint("circle-color", json!("#007cbf"))
    }

    fn initial() -> StyleState {
        state(&[("my-points", point_source(13.4, 52.5))], vec![points_layer()])
    }

    #[test]
    fn identical_states_plan_nothing() {
        let s = initial();
        assert_eq!(plan(&s, &s).unwrap(), vec![]);
    }

    #[test]
    fn single_paint_change_is_a_single_op() {
        let prev = initial();
        let next = state(
            &[("my-points", point_source(13.4, 52.5))],
            vec![points_layer().with_paint("circle-color", json!("#e63946"))],
        );
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![StyleOp::SetPaintProperty {
                layer: "points".to_string(),
                name: "circle-color".to_string(),
                value: Some(json!("#e63946")),
            }]
        );
    }

    #[test]
    fn new_source_and_layer_are_added_on_top() {
        let prev = initial();
        let next = state(
            &[
                ("my-points", point_source(13.4, 52.5)),
                ("my-points-2", point_source(2.35, 48.85)),
            ],
            vec![points_layer(), LayerDef::new("points-2", "circle", "my-points-2")],
        );
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![
                StyleOp::AddSource {
                    id: "my-points-2".to_string(),
                    source: point_source(2.35, 48.85),
                },
                StyleOp::AddLayer {
                    layer: LayerDef::new("points-2", "circle", "my-points-2"),
                    before: None,
                },
            ]
        );
    }

    #[test]
    fn changed_data_updates_in_place() {
        let prev = initial();
        let next = state(&[("my-points", point_source(2.35, 48.85))], vec![points_layer()]);
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![StyleOp::UpdateSource {
                id: "my-points".to_string(),
                source: point_source(2.35, 48.85),
            }]
        );
    }

    #[test]
    fn removed_source_goes_after_its_layers() {
        let prev = initial();
        let next = state(&[], vec![]);
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![
                StyleOp::RemoveLayer {
                    id: "points".to_string()
                },
                StyleOp::RemoveSource {
                    id: "my-points".to_string()
                },
            ]
        );
    }

    #[test]
    fn dangling_source_rejects_the_whole_plan() {
        let prev = initial();
        let next = state(
            &[("my-points", point_source(13.4, 52.5))],
            vec![
                points_layer().with_paint("circle-color", json!("red")),
                LayerDef::new("ghost", "circle", "nowhere"),
            ],
        );
        let err = plan(&prev, &next).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DanglingSource {
                layer: "ghost".to_string(),
                source_id: "nowhere".to_string(),
            }
        );
        assert_eq!(err.layer_id(), "ghost");
    }

    #[test]
    fn validation_catches_duplicates_and_missing_sources() {
        let dup = state(
            &[("my-points", point_source(0.0, 0.0))],
            vec![points_layer(), points_layer()],
        );
        assert!(matches!(
            validate(&dup),
            Err(ConfigurationError::DuplicateLayerId { .. })
        ));

        let mut no_source = LayerDef::new("x", "circle", "s");
        no_source.source = None;
        assert!(matches!(
            validate(&state(&[], vec![no_source])),
            Err(ConfigurationError::LayerWithoutSource { .. })
        ));

        let mut background = LayerDef::new("bg", "background", "s");
        background.source = None;
        assert!(validate(&state(&[], vec![background])).is_ok());

        let mut hover = initial();
        hover.hover_layer = Some("missing".to_string());
        assert!(matches!(
            validate(&hover),
            Err(ConfigurationError::UnknownHoverLayer { .. })
        ));
    }

    #[test]
    fn initial_mount_adds_bottom_up_via_before_anchors() {
        let empty = StyleState::default();
        let next = state(
            &[("s", point_source(0.0, 0.0))],
            vec![
                LayerDef::new("a", "circle", "s"),
                LayerDef::new("b", "circle", "s"),
                LayerDef::new("c", "circle", "s"),
            ],
        );
        let layer_ops: Vec<(String, Option<String>)> = plan(&empty, &next)
            .unwrap()
            .into_iter()
            .filter_map(|op| match op {
                StyleOp::AddLayer { layer, before } => Some((layer.id, before)),
                _ => None,
            })
            .collect();
        assert_eq!(
            layer_ops,
            vec![
                ("c".to_string(), None),
                ("b".to_string(), Some("c".to_string())),
                ("a".to_string(), Some("b".to_string())),
            ]
        );
    }

    #[test]
    fn reorder_moves_only_out_of_place_layers() {
        let layers = |ids: &[&str]| -> Vec<LayerDef> {
            ids.iter().map(|id| LayerDef::new(*id, "circle", "s")).collect()
        };
        let src = [("s", point_source(0.0, 0.0))];
        let prev = state(&src, layers(&["a", "b", "c", "d"]));
        let next = state(&src, layers(&["b", "c", "d", "a"]));
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![StyleOp::MoveLayer {
                id: "a".to_string(),
                before: None,
            }]
        );
    }

    #[test]
    fn type_change_recreates_layer_in_place() {
        let src = [("s", point_source(0.0, 0.0))];
        let prev = state(
            &src,
            vec![LayerDef::new("a", "circle", "s"), LayerDef::new("b", "circle", "s")],
        );
        let next = state(
            &src,
            vec![LayerDef::new("a", "symbol", "s"), LayerDef::new("b", "circle", "s")],
        );
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![
                StyleOp::RemoveLayer { id: "a".to_string() },
                StyleOp::AddLayer {
                    layer: LayerDef::new("a", "symbol", "s"),
                    before: Some("b".to_string()),
                },
            ]
        );
    }

    #[test]
    fn removed_paint_key_resets_and_zoom_range_changes_once() {
        let prev = initial();
        let mut layer = LayerDef::new("points", "circle", "my-points")
            .with_paint("circle-radius", json!(8));
        layer.minzoom = Some(3.0);
        layer.maxzoom = Some(12.0);
        layer.filter = Some(json!(["==", "kind", "city"]));
        let next = state(&[("my-points", point_source(13.4, 52.5))], vec![layer]);

        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![
                StyleOp::SetPaintProperty {
                    layer: "points".to_string(),
                    name: "circle-color".to_string(),
                    value: None,
                },
                StyleOp::SetFilter {
                    layer: "points".to_string(),
                    filter: Some(json!(["==", "kind", "city"])),
                },
                StyleOp::SetZoomRange {
                    layer: "points".to_string(),
                    minzoom: Some(3.0),
                    maxzoom: Some(12.0),
                },
            ]
        );
    }

    #[test]
    fn hover_and_click_bindings_follow_templates() {
        let prev = initial();
        let mut layer = points_layer().with_hover_html("<b>{name}</b>");
        layer.send_click = true;
        let next = state(&[("my-points", point_source(13.4, 52.5))], vec![layer.clone()]);
        assert_eq!(
            plan(&prev, &next).unwrap(),
            vec![
                StyleOp::BindHover {
                    layer: "points".to_string()
                },
                StyleOp::BindClick {
                    layer: "points".to_string()
                },
            ]
        );

        // Unchanged template: nothing to rebind.
        assert_eq!(plan(&next, &next).unwrap(), vec![]);

        // Changed template rebinds.
        let changed = state(
            &[("my-points", point_source(13.4, 52.5))],
            vec![LayerDef {
                hover_html: Some("{name}".to_string()),
                ..layer
            }],
        );
        assert_eq!(
            plan(&next, &changed).unwrap(),
            vec![StyleOp::BindHover {
                layer: "points".to_string()
            }]
        );

        // Dropping the layer unbinds before removal.
        let gone = state(&[("my-points", point_source(13.4, 52.5))], vec![]);
        assert_eq!(
            plan(&changed, &gone).unwrap(),
            vec![
                StyleOp::UnbindHover {
                    layer: "points".to_string()
                },
                StyleOp::UnbindClick {
                    layer: "points".to_string()
                },
                StyleOp::RemoveLayer {
                    id: "points".to_string()
                },
            ]
        );
    }

    #[test]
    fn basemap_change_resets_and_replays_everything() {
        let prev = initial();
        let mut next = initial();
        next.basemap = Basemap::Url("https://demotiles.maplibre.org/style.json".to_string());
        let kinds: Vec<&str> = plan(&prev, &next)
            .unwrap()
            .iter()
            .map(StyleOp::kind)
            .collect();
        assert_eq!(kinds, vec!["set_style", "add_source", "add_layer"]);
    }

    #[test]
    fn camera_diff_is_per_field() {
        let prev = CameraState::default();
        let next = CameraState {
            center: LngLat::new(13.4, 52.5),
            zoom: 5.0,
            ..CameraState::default()
        };
        assert_eq!(
            diff_camera(&prev, &next),
            vec![
                StyleOp::SetCenter {
                    center: LngLat::new(13.4, 52.5)
                },
                StyleOp::SetZoom { zoom: 5.0 },
            ]
        );
        assert!(diff_camera(&next, &next).is_empty());
    }

    #[test]
    fn lis_picks_longest_run() {
        assert_eq!(longest_increasing_subsequence(&[3, 0, 1, 2]), vec![0, 1, 2]);
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[2, 1, 0]).len(), 1);
    }
}
