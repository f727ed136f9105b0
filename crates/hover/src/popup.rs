use foundation::LngLat;
use serde::Serialize;
use tracing::trace;

use crate::pick::{HoverCandidate, ScreenPoint, closest};
use crate::template::render;

/// What the host should do with the popup after a pointer event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PopupAction {
    Show {
        lnglat: LngLat,
        html: String,
        layer_id: String,
    },
    Hide,
    /// Popup already shows the right content.
    Keep,
}

#[derive(Debug, Clone, PartialEq)]
struct Shown {
    layer_id: String,
    anchor: LngLat,
    html: String,
}

/// Tracks the single hover popup of a map.
#[derive(Debug, Default)]
pub struct HoverController {
    shown: Option<Shown>,
}

impl HoverController {
    pub fn new() -> Self {
        Self::default()
    }

    /// `templates` maps hover-enabled layer ids to their templates; candidates
    /// on other layers are ignored.
    pub fn on_pointer_move(
        &mut self,
        point: ScreenPoint,
        candidates: &[HoverCandidate],
        templates: &[(&str, &str)],
    ) -> PopupAction {
        let template_for = |layer: &str| {
            templates
                .iter()
                .find(|(id, _)| *id == layer)
                .map(|(_, t)| *t)
        };
        let eligible = candidates.iter().filter(|c| template_for(&c.layer_id).is_some());
        let Some(hit) = closest(point, eligible) else {
            return self.hide();
        };
        let Some(template) = template_for(&hit.layer_id) else {
            return self.hide();
        };

        let next = Shown {
            layer_id: hit.layer_id.clone(),
            anchor: hit.anchor,
            html: render(template, &hit.properties),
        };
        if self.shown.as_ref() == Some(&next) {
            return PopupAction::Keep;
        }
        trace!(layer = %next.layer_id, "hover popup");
        let action = PopupAction::Show {
            lnglat: next.anchor,
            html: next.html.clone(),
            layer_id: next.layer_id.clone(),
        };
        self.shown = Some(next);
        action
    }

    pub fn on_pointer_leave(&mut self) -> PopupAction {
        self.hide()
    }

    /// Forgets the popup without emitting anything, e.g. after a style reload.
    pub fn reset(&mut self) {
        self.shown = None;
    }

    pub fn is_open(&self) -> bool {
        self.shown.is_some()
    }

    /// The pointer cursor is shown while a popup is open.
    pub fn pointer_cursor(&self) -> bool {
        self.is_open()
    }

    pub fn hovered_layer(&self) -> Option<&str> {
        self.shown.as_ref().map(|s| s.layer_id.as_str())
    }

    fn hide(&mut self) -> PopupAction {
        match self.shown.take() {
            Some(_) => PopupAction::Hide,
            None => PopupAction::Keep,
        }
    }
}
