use serde::Serialize;
use serde_json::{Map, Value};

/// Something the host should learn about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// An update was rejected; the previous state stays on the map.
    ConfigurationError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        layer: Option<String>,
    },
    /// Features clicked on a layer with `send_click`.
    Click {
        layer: String,
        features: Vec<Map<String, Value>>,
    },
}

impl WidgetEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetEvent::ConfigurationError { .. } => "configuration_error",
            WidgetEvent::Click { .. } => "click",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Emission order, starting at 0.
    pub seq: u64,
    #[serde(flatten)]
    pub event: WidgetEvent,
}

#[derive(Debug, Default)]
pub struct EventBus {
    next_seq: u64,
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: WidgetEvent) {
        self.events.push(Event {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, WidgetEvent};
    use serde_json::{Map, json};

    #[test]
    fn sequence_survives_drain() {
        let mut bus = EventBus::new();
        bus.emit(WidgetEvent::Click {
            layer: "points".to_string(),
            features: vec![Map::new()],
        });
        assert_eq!(bus.drain().len(), 1);
        assert!(bus.events().is_empty());

        bus.emit(WidgetEvent::ConfigurationError {
            message: "bad".to_string(),
            layer: None,
        });
        assert_eq!(bus.events()[0].seq, 1);
        assert_eq!(bus.events()[0].event.kind(), "configuration_error");
    }

    #[test]
    fn serializes_flat() {
        let mut bus = EventBus::new();
        bus.emit(WidgetEvent::Click {
            layer: "points".to_string(),
            features: vec![],
        });
        assert_eq!(
            serde_json::to_value(&bus.events()[0]).unwrap(),
            json!({"seq": 0, "event": "click", "layer": "points", "features": []})
        );
    }
}
