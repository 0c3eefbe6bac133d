use std::rc::Rc;

use serde_json::{Map, Value};

use mapspec_core::LngLat;

use crate::engine::DragPhase;
use crate::latest::LatestCell;

/// Interaction reported to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Pointer over a feature of a layer with a tooltip.
    Hover { layer: String, text: String, lnglat: LngLat },
    HoverEnd { layer: String },
    /// Click on a feature of a clickable layer.
    Click {
        layer: String,
        properties: Map<String, Value>,
        lnglat: LngLat,
    },
    MarkerClick { marker: String },
    MarkerDrag { marker: String, phase: DragPhase, lnglat: LngLat },
}

pub type EventSink = Rc<dyn Fn(MapEvent)>;

/// Where listener callbacks deliver events; swapped without re-registering.
pub type SinkCell = LatestCell<Option<EventSink>>;

pub(crate) fn dispatch(sink: &SinkCell, event: MapEvent) {
    // Clone out first so the sink may replace itself while handling.
    if let Some(sink) = sink.get() {
        sink(event);
    }
}
