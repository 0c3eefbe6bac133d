//! Identity-keyed reconciliation of point markers.

use std::rc::Rc;

use indexmap::IndexMap;

use mapspec_core::{LngLat, MarkerDefinition};

use crate::engine::{DragPhase, MarkerCallbacks, RenderEngine};
use crate::events::{dispatch, MapEvent, SinkCell};
use crate::latest::LatestCell;

/// What one marker pass did, per marker id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerReport {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    /// Present in both, position pushed to the engine.
    pub moved: Vec<String>,
    /// Color or icon changed, element rebuilt.
    pub recreated: Vec<String>,
    /// Label, tooltip, popup or draggable changed in place.
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

impl MarkerReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.recreated.is_empty() && self.updated.is_empty()
    }
}

pub struct MarkerSync {
    live: IndexMap<String, MarkerDefinition>,
    current: LatestCell<IndexMap<String, MarkerDefinition>>,
    events: SinkCell,
}

impl MarkerSync {
    pub fn new(events: SinkCell) -> Self {
        Self {
            live: IndexMap::new(),
            current: LatestCell::new(IndexMap::new()),
            events,
        }
    }

    pub fn sync(&mut self, engine: &dyn RenderEngine, markers: &IndexMap<String, MarkerDefinition>) -> MarkerReport {
        let mut report = MarkerReport::default();
        self.current.set(markers.clone());

        let gone: Vec<String> = self.live.keys().filter(|id| !markers.contains_key(*id)).cloned().collect();
        for id in gone {
            engine.remove_marker(&id);
            self.live.shift_remove(&id);
            report.removed.push(id);
        }

        for (id, marker) in markers {
            let Some(previous) = self.live.get(id) else {
                self.add(engine, id, marker, &mut report.added, &mut report.failed);
                continue;
            };

            if previous.visual_identity() != marker.visual_identity() {
                engine.remove_marker(id);
                self.live.shift_remove(id);
                self.add(engine, id, marker, &mut report.recreated, &mut report.failed);
                continue;
            }

            if let Err(e) = engine.set_marker_position(id, marker.coordinates) {
                log::warn!("Failed to move marker {}: {}", id, e);
                report.failed.push(id.clone());
                continue;
            }
            report.moved.push(id.clone());

            let mut positioned = previous.clone();
            positioned.coordinates = marker.coordinates;
            if positioned != *marker {
                match engine.update_marker(id, marker) {
                    Ok(()) => report.updated.push(id.clone()),
                    Err(e) => {
                        log::warn!("Failed to update marker {}: {}", id, e);
                        report.failed.push(id.clone());
                    }
                }
            }
            self.live.insert(id.clone(), marker.clone());
        }

        if !report.is_noop() {
            log::info!(
                "Marker pass: {} removed, {} added, {} recreated, {} updated",
                report.removed.len(),
                report.added.len(),
                report.recreated.len(),
                report.updated.len()
            );
        }
        report
    }

    fn add(
        &mut self,
        engine: &dyn RenderEngine,
        id: &str,
        marker: &MarkerDefinition,
        done: &mut Vec<String>,
        failed: &mut Vec<String>,
    ) {
        match engine.add_marker(id, marker, self.callbacks(id)) {
            Ok(()) => {
                self.live.insert(id.to_string(), marker.clone());
                done.push(id.to_string());
            }
            Err(e) => {
                log::warn!("Failed to add marker {}: {}", id, e);
                failed.push(id.to_string());
            }
        }
    }

    /// Drag callbacks consult the latest definitions, so toggling
    /// `draggable` takes effect without rebuilding the element.
    fn callbacks(&self, id: &str) -> MarkerCallbacks {
        let click_events = self.events.clone();
        let click_id = id.to_string();

        let drag_events = self.events.clone();
        let current = self.current.clone();
        let drag_id = id.to_string();

        MarkerCallbacks {
            on_click: Some(Rc::new(move || {
                dispatch(
                    &click_events,
                    MapEvent::MarkerClick {
                        marker: click_id.clone(),
                    },
                )
            })),
            on_drag: Some(Rc::new(move |phase: DragPhase, lnglat: LngLat| {
                let draggable = current.with(|markers| markers.get(&drag_id).is_some_and(|m| m.draggable));
                if draggable {
                    dispatch(
                        &drag_events,
                        MapEvent::MarkerDrag {
                            marker: drag_id.clone(),
                            phase,
                            lnglat,
                        },
                    );
                }
            })),
        }
    }

    /// Remove every live marker from the engine.
    pub fn clear(&mut self, engine: &dyn RenderEngine) {
        for id in self.live.keys() {
            engine.remove_marker(id);
        }
        self.forget();
    }

    /// Forget live markers without engine calls, for a replaced renderer.
    pub fn forget(&mut self) {
        self.live.clear();
        self.current.set(IndexMap::new());
    }

    pub fn live_ids(&self) -> Vec<String> {
        self.live.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
