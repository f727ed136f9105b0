use tracing::{debug, warn};

use crate::diff::plan;
use crate::error::{ConfigurationError, MapError};
use crate::handle::{MapHandle, execute};
use crate::model::StyleState;
use crate::ops::StyleOp;

/// Outcome of executing a planned update.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplyReport {
    /// Every op that was attempted, in order.
    pub ops: Vec<StyleOp>,
    /// Ops the map refused; the rest still ran.
    pub failures: Vec<(StyleOp, MapError)>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.ops.iter().filter(|op| op.kind() == kind).count()
    }

    pub fn merge(&mut self, other: ApplyReport) {
        self.ops.extend(other.ops);
        self.failures.extend(other.failures);
    }
}

/// Plans `prev → next` and executes it against `map`.
///
/// Configuration errors are returned before any map call is made.
pub fn apply<M: MapHandle + ?Sized>(
    prev: &StyleState,
    next: &StyleState,
    map: &mut M,
) -> Result<ApplyReport, ConfigurationError> {
    let ops = plan(prev, next)?;
    Ok(execute_all(map, ops))
}

/// Executes `ops` in order. A failing op is logged and skipped.
pub fn execute_all<M: MapHandle + ?Sized>(map: &mut M, ops: Vec<StyleOp>) -> ApplyReport {
    let mut report = ApplyReport::default();
    for op in ops {
        debug!(%op, "map op");
        if let Err(err) = execute(map, &op) {
            warn!(op = op.kind(), error = %err, "map rejected operation");
            report.failures.push((op.clone(), err));
        }
        report.ops.push(op);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::apply;
    use crate::error::ConfigurationError;
    use crate::memory::MemoryMap;
    use crate::model::{LayerDef, LayerList, SourceDef, SourceSet, StyleState};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fc(name: &str) -> SourceDef {
        SourceDef::geojson(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                "properties": {"name": name}
            }]
        }))
    }

    fn state(sources: &[(&str, &str)], layers: &[(&str, &str)]) -> StyleState {
        let mut set = SourceSet::new();
        for (id, name) in sources {
            set.insert(*id, fc(name));
        }
        StyleState {
            sources: set,
            layers: LayerList::from(
                layers
                    .iter()
                    .map(|(id, src)| LayerDef::new(*id, "circle", *src))
                    .collect::<Vec<_>>(),
            ),
            ..StyleState::default()
        }
    }

    fn mounted(s: &StyleState) -> MemoryMap {
        let mut map = MemoryMap::new();
        apply(&StyleState::default(), s, &mut map).unwrap();
        map.take_calls();
        map
    }

    #[test]
    fn second_application_is_a_no_op() {
        let s = state(&[("a", "A")], &[("l1", "a")]);
        let mut map = mounted(&s);
        let report = apply(&s, &s, &mut map).unwrap();
        assert!(report.is_empty());
        assert!(map.calls().is_empty());
    }

    #[test]
    fn source_round_trip_restores_the_map() {
        let a = state(&[("a", "A"), ("b", "B")], &[]);
        let b = state(&[("b", "B2"), ("c", "C")], &[]);
        let mut map = mounted(&a);
        let before = map.sources().clone();

        assert!(apply(&a, &b, &mut map).unwrap().is_clean());
        assert_eq!(map.sources(), &b.sources);
        assert!(apply(&b, &a, &mut map).unwrap().is_clean());
        assert_eq!(map.sources(), &before);
    }

    #[test]
    fn live_order_tracks_every_snapshot() {
        let src = [("s", "S")];
        let snapshots: [&[(&str, &str)]; 5] = [
            &[("a", "s"), ("b", "s"), ("c", "s")],
            &[("c", "s"), ("a", "s"), ("d", "s")],
            &[("d", "s"), ("e", "s"), ("c", "s"), ("a", "s")],
            &[("a", "s")],
            &[("f", "s"), ("a", "s"), ("g", "s")],
        ];
        let mut prev = state(&src, &[]);
        let mut map = mounted(&prev);
        for layers in snapshots {
            let next = state(&src, layers);
            let report = apply(&prev, &next, &mut map).unwrap();
            assert!(report.is_clean(), "{:?}", report.failures);
            let expected: Vec<&str> = layers.iter().map(|(id, _)| *id).collect();
            assert_eq!(map.layer_ids(), expected);
            prev = next;
        }
    }

    #[test]
    fn rejected_update_touches_nothing() {
        let s = state(&[("a", "A")], &[("l1", "a")]);
        let mut map = mounted(&s);
        let bad = state(&[("a", "A")], &[("l1", "a"), ("l2", "missing")]);
        let err = apply(&s, &bad, &mut map).unwrap_err();
        assert_eq!(err.layer_id(), "l2");
        assert!(matches!(err, ConfigurationError::DanglingSource { .. }));
        assert!(map.calls().is_empty());
        assert_eq!(map.layer_ids(), vec!["l1"]);
    }

    #[test]
    fn map_failures_are_collected_and_skipped() {
        let s = state(&[("a", "A")], &[("l1", "a")]);
        let mut map = mounted(&s);
        // The live map lost the layer behind our back.
        map.force_remove_layer("l1");
        let mut next = s.clone();
        next.layers = LayerList::from(vec![
            LayerDef::new("l1", "circle", "a").with_paint("circle-color", json!("red")),
        ]);
        let report = apply(&s, &next, &mut map).unwrap();
        assert_eq!(report.ops.len(), 1);
        assert_eq!(report.failures.len(), 1);
    }
}
