use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use legend::{ColorbarConfig, FlatColorbar, render_svg};
use serde::Serialize;
use serde_json::Value;
use style::{MemoryMap, Patch, StyleOp};
use foundation::display_number;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use widget::{MapWidget, PropUpdate, WidgetProps};

/// Replays widget props against an in-memory map and prints what the live
/// map would be asked to do.
#[derive(Debug, Parser)]
#[command(name = "mapbind", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mount `props`, load the style, then apply each updates file in order.
    Replay {
        props: PathBuf,
        updates: Vec<PathBuf>,
        /// Live zoom reported before the updates run. Picks the colorbars
        /// printed after each step.
        #[arg(long)]
        zoom: Option<f64>,
        /// One JSON line per op or colorbar instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Structural patch turning `prev` into `next`.
    Diff { prev: PathBuf, next: PathBuf },
    /// SVG of the colorbar selected at `zoom`.
    Colorbar {
        config: PathBuf,
        #[arg(long)]
        zoom: f64,
        #[arg(long, default_value_t = 240.0)]
        width: f64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Replay {
            props,
            updates,
            zoom,
            json,
        } => {
            let props = read_json(&props)?;
            let mut batches = Vec::with_capacity(updates.len());
            for path in &updates {
                batches.push(read_updates(path)?);
            }
            for line in replay(props, batches, zoom)? {
                if json {
                    println!("{}", serde_json::to_string(&line).map_err(|e| e.to_string())?);
                } else {
                    println!("{line}");
                }
            }
            Ok(())
        }
        Command::Diff { prev, next } => {
            let patch = Patch::between(&read_json(&prev)?, &read_json(&next)?);
            let out = serde_json::to_string_pretty(&patch).map_err(|e| e.to_string())?;
            println!("{out}");
            Ok(())
        }
        Command::Colorbar { config, zoom, width } => {
            println!("{}", colorbar_svg(&read_json(&config)?, zoom, width)?);
            Ok(())
        }
    }
}

fn read_json(path: &Path) -> Result<Value, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

/// A file holds one update or an array of them.
fn read_updates(path: &Path) -> Result<Vec<PropUpdate>, String> {
    parse_updates(read_json(path)?).map_err(|e| format!("{}: {e}", path.display()))
}

fn parse_updates(value: Value) -> Result<Vec<PropUpdate>, String> {
    let updates = match value {
        Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|u| vec![u]),
    };
    updates.map_err(|e| e.to_string())
}

/// One line of `replay` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum ReplayLine {
    Op(StyleOp),
    Colorbar(ActiveColorbar),
}

/// A colorbar shown at the live zoom.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct ActiveColorbar {
    colorbar: &'static str,
    zoom: f64,
    title: Option<String>,
}

impl fmt::Display for ReplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayLine::Op(op) => write!(f, "{op}"),
            ReplayLine::Colorbar(c) => write!(
                f,
                "colorbar {} at zoom {}: {}",
                c.colorbar,
                display_number(c.zoom),
                c.title.as_deref().unwrap_or("(untitled)")
            ),
        }
    }
}

/// Every op the map receives: mount and style load, then each batch. The
/// colorbars active at the live zoom follow each step.
fn replay(props: Value, batches: Vec<Vec<PropUpdate>>, zoom: Option<f64>) -> Result<Vec<ReplayLine>, String> {
    let props = WidgetProps::from_value(props).map_err(|e| e.to_string())?;
    let mut widget = MapWidget::mount(props, MemoryMap::new()).map_err(|e| e.to_string())?;
    widget.on_style_loaded().map_err(|e| e.to_string())?;
    if let Some(zoom) = zoom {
        widget.on_zoom(zoom);
    }
    let mut lines = Vec::new();
    flush_step(&mut widget, &mut lines);
    for (i, batch) in batches.into_iter().enumerate() {
        let report = widget.update_many(batch).map_err(|e| format!("update batch {}: {e}", i + 1))?;
        for (op, err) in &report.failures {
            eprintln!("warning: {op}: {err}");
        }
        debug!(batch = i + 1, ops = report.ops.len(), "batch replayed");
        flush_step(&mut widget, &mut lines);
    }
    Ok(lines)
}

fn flush_step(widget: &mut MapWidget<MemoryMap>, lines: &mut Vec<ReplayLine>) {
    lines.extend(widget.map_mut().take_calls().into_iter().map(ReplayLine::Op));
    let zoom = widget.live_zoom();
    let active = widget.active_colorbars();
    let shown = |colorbar: &'static str, c: Option<&FlatColorbar>| {
        c.map(|c| {
            ReplayLine::Colorbar(ActiveColorbar {
                colorbar,
                zoom,
                title: c.title.clone(),
            })
        })
    };
    lines.extend(shown("map", active.map));
    lines.extend(shown("risk", active.risk));
}

fn colorbar_svg(config: &Value, zoom: f64, width: f64) -> Result<String, String> {
    let config = ColorbarConfig::from_value(config).map_err(|e| e.to_string())?;
    let colorbar = config
        .select(zoom)
        .ok_or_else(|| format!("no colorbar at zoom {zoom}"))?;
    Ok(render_svg(colorbar, width, "colorbar"))
}

#[cfg(test)]
mod tests {
    use super::{ActiveColorbar, ReplayLine, colorbar_svg, parse_updates, replay};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use style::StyleOp;

    fn props() -> serde_json::Value {
        json!({
            "sources": {"s": {"type": "geojson", "data": {"type": "FeatureCollection", "features": []}}},
            "layers": [{"id": "a", "type": "circle", "source": "s", "paint": {"circle-radius": 4}}]
        })
    }

    #[test]
    fn single_update_or_array() {
        let one = parse_updates(json!({"prop": "zoom", "replace": 5})).unwrap();
        let many = parse_updates(json!([
            {"prop": "zoom", "replace": 5},
            {"prop": "pitch", "replace": 30}
        ]))
        .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(many.len(), 2);
        assert!(parse_updates(json!({"prop": "nope", "replace": 1})).is_err());
    }

    #[test]
    fn paint_change_replays_as_one_op() {
        let batch = parse_updates(json!({
            "prop": "layers",
            "patch": [{"path": [0, "paint", "circle-radius"], "op": "set", "value": 9}]
        }))
        .unwrap();
        let lines = replay(props(), vec![batch], None).unwrap();
        let last = lines.last().unwrap();
        assert!(matches!(
            last,
            ReplayLine::Op(StyleOp::SetPaintProperty { layer, name, .. }) if layer == "a" && name == "circle-radius"
        ));
        let adds = lines
            .iter()
            .filter(|l| matches!(l, ReplayLine::Op(StyleOp::AddLayer { .. })))
            .count();
        assert_eq!(adds, 1);
    }

    fn colorbar_lines(lines: &[ReplayLine]) -> Vec<&ActiveColorbar> {
        lines
            .iter()
            .filter_map(|l| match l {
                ReplayLine::Colorbar(c) => Some(c),
                ReplayLine::Op(_) => None,
            })
            .collect()
    }

    #[test]
    fn zoom_picks_the_reported_colorbar() {
        let bar = |title: &str| json!({"stops": {"0": ["#000", "#000"], "1": ["#fff", "#fff"]}, "title": title});
        let mut p = props();
        p["zoom"] = json!(2);
        p["colorbar_map"] = json!({"0": bar("coarse"), "8": bar("fine")});

        let default = replay(p.clone(), vec![], None).unwrap();
        let zoomed = replay(p, vec![], Some(9.0)).unwrap();
        assert_eq!(colorbar_lines(&default)[0].title.as_deref(), Some("coarse"));
        assert_eq!(colorbar_lines(&zoomed)[0].title.as_deref(), Some("fine"));
        assert_eq!(zoomed.last().unwrap().to_string(), "colorbar map at zoom 9: fine");
        assert_eq!(
            serde_json::to_value(zoomed.last().unwrap()).unwrap(),
            json!({"colorbar": "map", "zoom": 9.0, "title": "fine"})
        );
    }

    #[test]
    fn dangling_source_fails_the_replay() {
        let batch = parse_updates(json!({
            "prop": "layers",
            "replace": [{"id": "b", "type": "line", "source": "missing"}]
        }))
        .unwrap();
        let err = replay(props(), vec![batch], None).unwrap_err();
        assert!(err.starts_with("update batch 1:"), "{err}");
        assert!(err.contains("missing"), "{err}");
    }

    #[test]
    fn colorbar_needs_a_match_at_zoom() {
        let flat = json!({"stops": {"0": ["#000000", "#000000"], "1": ["#ffffff", "#ffffff"]}});
        assert!(colorbar_svg(&flat, 3.0, 200.0).unwrap().starts_with("<svg"));

        let indexed = json!({"10": flat});
        assert!(colorbar_svg(&indexed, 12.0, 200.0).is_ok());
    }
}
