//! The map widget as seen by its host: a props snapshot, property updates and
//! map events in, map calls and host events out.

pub mod error;
pub mod events;
pub mod props;
pub mod widget;

pub use error::WidgetError;
pub use events::{Event, EventBus, WidgetEvent};
pub use props::{PropChange, PropName, PropUpdate, WidgetProps};
pub use widget::{ActiveColorbars, MapWidget};
