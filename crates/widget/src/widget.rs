use foundation::LngLat;
use hover::{HoverCandidate, HoverController, PopupAction, ScreenPoint};
use legend::{
    ColorbarConfig, FlatColorbar, LayerVisibility, LegendEntry, legend_entries, visibility_value,
};
use serde_json::{Map, Value};
use style::{
    ApplyReport, CameraState, LayerDef, LayerList, MapHandle, StyleOp, StyleState, apply,
    diff_camera, execute_all, validate,
};
use tracing::{debug, info, warn};

use crate::error::WidgetError;
use crate::events::{EventBus, WidgetEvent};
use crate::props::{PropUpdate, WidgetProps};

/// Colorbars selected for the current zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveColorbars<'a> {
    pub map: Option<&'a FlatColorbar>,
    pub risk: Option<&'a FlatColorbar>,
}

/// View restored on double click.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SavedView {
    center: LngLat,
    zoom: f64,
}

impl SavedView {
    fn of(props: &WidgetProps) -> Self {
        Self {
            center: props.center,
            zoom: props.zoom,
        }
    }
}

/// A mounted map widget.
///
/// Holds the props snapshot the host last committed and the style state that
/// is actually on the map. Updates are applied one at a time, in the order
/// they are passed in.
pub struct MapWidget<M: MapHandle> {
    map: M,
    props: WidgetProps,
    colorbar_map: Option<ColorbarConfig>,
    colorbar_risk: Option<ColorbarConfig>,
    // Style state on the map; empty until the style has loaded.
    applied: StyleState,
    style_loaded: bool,
    live_zoom: f64,
    saved_view: SavedView,
    hover: HoverController,
    visibility: LayerVisibility,
    events: EventBus,
}

impl<M: MapHandle> MapWidget<M> {
    /// Validates `props`, then sets the basemap and camera. Sources and layers
    /// follow in [`MapWidget::on_style_loaded`].
    pub fn mount(props: WidgetProps, mut map: M) -> Result<Self, WidgetError> {
        validate(&props.style_state())?;
        let (colorbar_map, colorbar_risk) = props.colorbars()?;

        let mut ops = vec![StyleOp::SetStyle {
            basemap: props.basemap.clone(),
        }];
        ops.extend(initial_camera_ops(&props.camera()));
        let report = execute_all(&mut map, ops);
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "map rejected initial setup");
        }
        info!(id = props.id.as_deref().unwrap_or(""), "map widget mounted");

        Ok(Self {
            map,
            colorbar_map,
            colorbar_risk,
            applied: StyleState::empty(props.basemap.clone()),
            style_loaded: false,
            live_zoom: props.zoom,
            saved_view: SavedView::of(&props),
            hover: HoverController::new(),
            visibility: LayerVisibility::new(&props.layers),
            events: EventBus::new(),
            props,
        })
    }

    /// Applies one property update.
    ///
    /// The new props are validated as a whole before the map is touched. On
    /// error nothing changes, the error is returned and also emitted as
    /// [`WidgetEvent::ConfigurationError`].
    pub fn update(&mut self, update: PropUpdate) -> Result<ApplyReport, WidgetError> {
        let result = self.try_update(&update);
        if let Err(err) = &result {
            warn!(prop = %update.prop, error = %err, "property update rejected");
            self.events.emit(WidgetEvent::ConfigurationError {
                message: err.to_string(),
                layer: err.layer_id().map(str::to_string),
            });
        }
        result
    }

    /// Applies `updates` in order, stopping at the first rejected one.
    pub fn update_many(
        &mut self,
        updates: impl IntoIterator<Item = PropUpdate>,
    ) -> Result<ApplyReport, WidgetError> {
        let mut report = ApplyReport::default();
        for update in updates {
            report.merge(self.update(update)?);
        }
        Ok(report)
    }

    fn try_update(&mut self, update: &PropUpdate) -> Result<ApplyReport, WidgetError> {
        let next = self.props.updated(update)?;
        let (colorbar_map, colorbar_risk) = next.colorbars()?;
        let mut visibility = self.visibility.clone();
        if visibility.sync(&next.layers) {
            debug!("legend layers changed, visibility reset");
        }
        let next_state = effective_state(&next, &visibility);
        validate(&next_state)?;

        let mut report = ApplyReport::default();
        if next.basemap != self.props.basemap {
            // The rest is replayed once the new style has loaded.
            report.merge(execute_all(
                &mut self.map,
                vec![StyleOp::SetStyle {
                    basemap: next.basemap.clone(),
                }],
            ));
            self.applied = StyleState::empty(next.basemap.clone());
            self.style_loaded = false;
            self.hover.reset();
        } else if self.style_loaded {
            report.merge(apply(&self.applied, &next_state, &mut self.map)?);
            self.applied = next_state;
        }

        let camera_ops = diff_camera(&self.props.camera(), &next.camera());
        if !camera_ops.is_empty() {
            report.merge(execute_all(&mut self.map, camera_ops));
        }
        if next.zoom != self.props.zoom {
            self.live_zoom = next.zoom;
        }
        self.saved_view = SavedView::of(&next);

        debug!(prop = %update.prop, ops = report.ops.len(), "property update applied");
        self.props = next;
        self.colorbar_map = colorbar_map;
        self.colorbar_risk = colorbar_risk;
        self.visibility = visibility;
        Ok(report)
    }

    /// The map's style finished loading and holds none of the widget's
    /// sources or layers yet. Repeated loads of the same style are ignored.
    pub fn on_style_loaded(&mut self) -> Result<ApplyReport, WidgetError> {
        if self.style_loaded {
            debug!("style already loaded, nothing to replay");
            return Ok(ApplyReport::default());
        }
        let next = effective_state(&self.props, &self.visibility);
        let base = StyleState::empty(self.props.basemap.clone());
        let report = apply(&base, &next, &mut self.map)?;
        self.applied = next;
        self.style_loaded = true;
        self.hover.reset();
        Ok(report)
    }

    pub fn on_zoom(&mut self, zoom: f64) {
        self.live_zoom = zoom;
    }

    /// Colorbars for the live zoom, selected on every call.
    pub fn active_colorbars(&self) -> ActiveColorbars<'_> {
        let zoom = self.live_zoom;
        ActiveColorbars {
            map: self.colorbar_map.as_ref().and_then(|c| c.select(zoom)),
            risk: self.colorbar_risk.as_ref().and_then(|c| c.select(zoom)),
        }
    }

    /// Layers the host should query for hover candidates.
    pub fn hover_query_layers(&self) -> Vec<&str> {
        self.applied
            .hover_layers()
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub fn on_pointer_move(&mut self, point: ScreenPoint, candidates: &[HoverCandidate]) -> PopupAction {
        let templates = self.applied.hover_layers();
        self.hover.on_pointer_move(point, candidates, &templates)
    }

    pub fn on_pointer_leave(&mut self) -> PopupAction {
        self.hover.on_pointer_leave()
    }

    /// Flies back to the view last set through props, north up and flat.
    pub fn on_double_click(&mut self) -> ApplyReport {
        execute_all(
            &mut self.map,
            vec![StyleOp::FlyTo {
                center: self.saved_view.center,
                zoom: self.saved_view.zoom,
                bearing: 0.0,
                pitch: 0.0,
            }],
        )
    }

    /// Emits a click event when `layer_id` has `send_click`. `features` are
    /// rendered-feature objects; only their properties are forwarded.
    pub fn on_layer_click(&mut self, layer_id: &str, features: &[Value]) -> bool {
        let Some(layer) = self.applied.layers.get(layer_id) else {
            return false;
        };
        if !layer.send_click || features.is_empty() {
            return false;
        }
        let features = features
            .iter()
            .map(|f| match f.get("properties") {
                Some(Value::Object(m)) => m.clone(),
                _ => Map::new(),
            })
            .collect();
        self.events.emit(WidgetEvent::Click {
            layer: layer_id.to_string(),
            features,
        });
        true
    }

    /// Shows or hides a legend layer. `None` when `id` is not in the legend.
    pub fn toggle_layer(&mut self, id: &str) -> Result<Option<ApplyReport>, WidgetError> {
        let Some(visible) = self.visibility.toggle(id) else {
            return Ok(None);
        };
        debug!(layer = id, visible, "legend toggle");
        if !self.style_loaded {
            return Ok(Some(ApplyReport::default()));
        }
        let next = effective_state(&self.props, &self.visibility);
        let report = apply(&self.applied, &next, &mut self.map)?;
        self.applied = next;
        Ok(Some(report))
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        legend_entries(&self.props.layers, &self.visibility)
    }

    pub fn props(&self) -> &WidgetProps {
        &self.props
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    pub fn live_zoom(&self) -> f64 {
        self.live_zoom
    }

    pub fn hover(&self) -> &HoverController {
        &self.hover
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Tears the map down and hands it back.
    pub fn unmount(mut self) -> M {
        self.hover.reset();
        self.map.remove();
        info!(id = self.props.id.as_deref().unwrap_or(""), "map widget unmounted");
        self.map
    }
}

fn initial_camera_ops(camera: &CameraState) -> Vec<StyleOp> {
    let mut ops = Vec::new();
    if camera.max_bounds.is_some() {
        ops.push(StyleOp::SetMaxBounds {
            bounds: camera.max_bounds,
        });
    }
    ops.extend([
        StyleOp::SetCenter {
            center: camera.center,
        },
        StyleOp::SetZoom { zoom: camera.zoom },
        StyleOp::SetBearing {
            bearing: camera.bearing,
        },
        StyleOp::SetPitch {
            pitch: camera.pitch,
        },
    ]);
    ops
}

// Props state with legend-hidden layers forced to `visibility: none`.
fn effective_state(props: &WidgetProps, visibility: &LayerVisibility) -> StyleState {
    let mut state = props.style_state();
    let layers: Vec<LayerDef> = state
        .layers
        .iter()
        .cloned()
        .map(|mut l| {
            if !visibility.is_visible(&l.id) {
                l.layout
                    .insert("visibility".to_string(), Value::from(visibility_value(false)));
            }
            l
        })
        .collect();
    state.layers = LayerList::from(layers);
    state
}

#[cfg(test)]
mod tests {
    use super::MapWidget;
    use crate::events::WidgetEvent;
    use crate::props::{PropName, PropUpdate, WidgetProps};
    use foundation::LngLat;
    use hover::{HoverCandidate, PopupAction, ScreenPoint};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value, json};
    use style::{MemoryMap, Patch, StyleOp, path};

    fn props() -> WidgetProps {
        WidgetProps::from_value(json!({
            "id": "my-map",
            "center": [13.4, 52.5],
            "zoom": 5,
            "sources": {
                "my-points": {
                    "type": "geojson",
                    "data": {
                        "type": "FeatureCollection",
                        "features": [{
                            "type": "Feature",
                            "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
                            "properties": {"name": "Berlin"}
                        }]
                    }
                }
            },
            "layers": [{
                "id": "points",
                "display_name": "Points",
                "type": "circle",
                "source": "my-points",
                "paint": {"circle-radius": 8, "circle-color": "#007cbf"},
                "hover_html": "<b>{name}</b>",
                "send_click": true
            }],
            "colorbar_map": {
                "0": {"stops": {"0": ["#000", "#111"], "100": ["#eee", "#fff"]}, "title": "coarse"},
                "8": {"stops": {"0": ["#000", "#111"], "100": ["#eee", "#fff"]}, "title": "fine"}
            }
        }))
        .unwrap()
    }

    fn loaded() -> MapWidget<MemoryMap> {
        let mut w = MapWidget::mount(props(), MemoryMap::new()).unwrap();
        w.on_style_loaded().unwrap();
        w.map_mut().take_calls();
        w
    }

    fn kinds(ops: &[StyleOp]) -> Vec<&'static str> {
        ops.iter().map(StyleOp::kind).collect()
    }

    #[test]
    fn mount_sets_style_and_camera_then_waits_for_style() {
        let w = MapWidget::mount(props(), MemoryMap::new()).unwrap();
        assert_eq!(
            kinds(w.map().calls()),
            vec!["set_style", "set_center", "set_zoom", "set_bearing", "set_pitch"]
        );
        assert!(w.map().layers().is_empty());
        assert_eq!(w.map().camera().center, LngLat::new(13.4, 52.5));
        assert!(!w.is_style_loaded());
    }

    #[test]
    fn style_load_adds_sources_layers_and_bindings() {
        let mut w = MapWidget::mount(props(), MemoryMap::new()).unwrap();
        w.map_mut().take_calls();
        let report = w.on_style_loaded().unwrap();
        assert_eq!(kinds(&report.ops), vec!["add_source", "add_layer", "bind_hover", "bind_click"]);
        assert_eq!(w.map().layer_ids(), vec!["points"]);
        assert_eq!(w.hover_query_layers(), vec!["points"]);
    }

    #[test]
    fn paint_patch_is_a_single_paint_call() {
        let mut w = loaded();
        let report = w
            .update(PropUpdate::patch(
                PropName::Layers,
                Patch::new().set(path![0usize, "paint", "circle-color"], json!("red")),
            ))
            .unwrap();
        assert_eq!(
            report.ops,
            vec![StyleOp::SetPaintProperty {
                layer: "points".to_string(),
                name: "circle-color".to_string(),
                value: Some(json!("red")),
            }]
        );
        assert_eq!(w.map().layer("points").unwrap().paint["circle-color"], json!("red"));
    }

    #[test]
    fn coordinate_patch_updates_source_in_place() {
        let mut w = loaded();
        let report = w
            .update(PropUpdate::patch(
                PropName::Sources,
                Patch::new()
                    .set(
                        path!["my-points", "data", "features", 0usize, "geometry", "coordinates"],
                        json!([2.35, 48.85]),
                    )
                    .set(
                        path!["my-points", "data", "features", 0usize, "properties", "name"],
                        json!("Paris"),
                    ),
            ))
            .unwrap();
        assert_eq!(kinds(&report.ops), vec!["update_source"]);
        assert_eq!(w.map().layer_ids(), vec!["points"]);
    }

    #[test]
    fn new_source_and_layer_land_on_top() {
        let mut w = loaded();
        let report = w
            .update_many([
                PropUpdate::patch(
                    PropName::Sources,
                    Patch::new().set(
                        path!["my-points-2"],
                        json!({"type": "geojson", "data": {"type": "FeatureCollection", "features": []}}),
                    ),
                ),
                PropUpdate::patch(
                    PropName::Layers,
                    Patch::new().append(
                        path![],
                        json!({"id": "points-2", "type": "circle", "source": "my-points-2"}),
                    ),
                ),
            ])
            .unwrap();
        assert_eq!(kinds(&report.ops), vec!["add_source", "add_layer"]);
        assert!(matches!(&report.ops[1], StyleOp::AddLayer { before: None, .. }));
        assert_eq!(w.map().layer_ids(), vec!["points", "points-2"]);
    }

    #[test]
    fn dangling_source_rejects_the_update() {
        let mut w = loaded();
        let before = w.props().clone();
        let err = w
            .update(PropUpdate::patch(
                PropName::Layers,
                Patch::new().append(path![], json!({"id": "bad", "type": "circle", "source": "nope"})),
            ))
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(err.layer_id(), Some("bad"));
        assert!(w.map().calls().is_empty());
        assert_eq!(w.props(), &before);
        match &w.events().events()[0].event {
            WidgetEvent::ConfigurationError { layer, .. } => assert_eq!(layer.as_deref(), Some("bad")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn updates_before_style_load_are_replayed() {
        let mut w = MapWidget::mount(props(), MemoryMap::new()).unwrap();
        w.map_mut().take_calls();
        let report = w
            .update(PropUpdate::patch(
                PropName::Layers,
                Patch::new().set(path![0usize, "paint", "circle-radius"], json!(3)),
            ))
            .unwrap();
        assert!(report.is_empty());
        w.on_style_loaded().unwrap();
        assert_eq!(w.map().layer("points").unwrap().paint["circle-radius"], json!(3));
    }

    #[test]
    fn basemap_change_reloads_everything() {
        let mut w = loaded();
        let report = w
            .update(PropUpdate::replace(
                PropName::Basemap,
                json!("https://demotiles.maplibre.org/style.json"),
            ))
            .unwrap();
        assert_eq!(kinds(&report.ops), vec!["set_style"]);
        assert!(!w.is_style_loaded());
        assert!(w.map().layer_ids().is_empty());

        w.on_style_loaded().unwrap();
        assert_eq!(w.map().layer_ids(), vec!["points"]);
    }

    #[test]
    fn repeated_style_load_is_ignored() {
        let mut w = loaded();
        let report = w.on_style_loaded().unwrap();
        assert!(report.is_empty());
        assert!(report.failures.is_empty());
        assert!(w.map().calls().is_empty());
        assert_eq!(w.map().layer_ids(), vec!["points"]);
    }

    #[test]
    fn camera_props_and_double_click() {
        let mut w = loaded();
        let report = w.update(PropUpdate::replace(PropName::Zoom, json!(9))).unwrap();
        assert_eq!(report.ops, vec![StyleOp::SetZoom { zoom: 9.0 }]);

        w.update(PropUpdate::replace(PropName::Bearing, json!(30))).unwrap();
        w.map_mut().take_calls();
        w.on_double_click();
        assert_eq!(
            w.map().calls(),
            &[StyleOp::FlyTo {
                center: LngLat::new(13.4, 52.5),
                zoom: 9.0,
                bearing: 0.0,
                pitch: 0.0,
            }]
        );
    }

    #[test]
    fn colorbar_follows_live_zoom() {
        let mut w = loaded();
        let title = |w: &MapWidget<MemoryMap>| w.active_colorbars().map.and_then(|c| c.title.clone());
        assert_eq!(title(&w).as_deref(), Some("coarse"));
        w.on_zoom(8.5);
        assert_eq!(title(&w).as_deref(), Some("fine"));
        w.on_zoom(-2.0);
        assert_eq!(title(&w).as_deref(), Some("coarse"));
        assert!(w.active_colorbars().risk.is_none());
    }

    #[test]
    fn legend_toggle_survives_layer_recreation() {
        let mut w = loaded();
        let report = w.toggle_layer("points").unwrap().unwrap();
        assert_eq!(kinds(&report.ops), vec!["set_layout_property"]);
        assert_eq!(w.map().layer("points").unwrap().layout["visibility"], json!("none"));
        assert!(!w.legend()[0].visible);

        // A type change re-creates the layer; it must come back hidden.
        w.update(PropUpdate::patch(
            PropName::Layers,
            Patch::new().set(path![0usize, "type"], json!("heatmap")),
        ))
        .unwrap();
        assert_eq!(w.map().layer("points").unwrap().layout["visibility"], json!("none"));

        w.toggle_layer("points").unwrap();
        assert_eq!(w.map().layer("points").unwrap().layout.get("visibility"), None);
        assert_eq!(w.toggle_layer("nope").unwrap(), None);
    }

    #[test]
    fn hover_popup_uses_layer_template() {
        let mut w = loaded();
        let mut properties = Map::new();
        properties.insert("name".to_string(), Value::from("Berlin"));
        let candidate = HoverCandidate {
            layer_id: "points".to_string(),
            feature_id: None,
            properties,
            anchor: LngLat::new(13.4, 52.5),
            screen: ScreenPoint::new(2.0, 2.0),
        };
        match w.on_pointer_move(ScreenPoint::new(0.0, 0.0), &[candidate]) {
            PopupAction::Show { html, .. } => assert_eq!(html, "<b>Berlin</b>"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(w.on_pointer_leave(), PopupAction::Hide);
    }

    #[test]
    fn clicks_are_forwarded_for_send_click_layers() {
        let mut w = loaded();
        assert!(w.on_layer_click("points", &[json!({"properties": {"name": "Berlin"}})]));
        assert!(!w.on_layer_click("points", &[]));
        assert!(!w.on_layer_click("other", &[json!({})]));
        let events = w.events_mut().drain();
        assert_eq!(events.len(), 1);
        match &events[0].event {
            WidgetEvent::Click { layer, features } => {
                assert_eq!(layer, "points");
                assert_eq!(features[0]["name"], json!("Berlin"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unmount_removes_the_map() {
        let w = loaded();
        let map = w.unmount();
        assert!(map.is_removed());
        assert!(map.layers().is_empty());
    }
}
