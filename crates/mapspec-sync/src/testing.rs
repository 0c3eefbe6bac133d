//! In-memory engine and collaborators used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use serde_json::Value;

use mapspec_core::layer::RouteProfile;
use mapspec_core::{CameraTarget, LngLat, MarkerDefinition, Projection};

use crate::engine::{
    DragPhase, EngineError, ListenerId, MarkerCallbacks, PointerCallback, PointerEvent, PointerEventKind,
    RenderEngine, SourceSpec, SubLayerSpec,
};
use crate::resolve::{ColumnarLoader, ColumnarTable, ResolveError, RouteResolver, TileMetadata, TileMetadataLoader};
use crate::tabular::AnalyticsTables;

/// A mutating engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetStyle(String),
    SetProjection(Projection),
    MoveCamera(CameraTarget),
    AddSource(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    SetLayout(String, String, Value),
    On(PointerEventKind, String),
    Off(ListenerId),
    AddMarker(String),
    MoveMarker(String, LngLat),
    UpdateMarker(String),
    RemoveMarker(String),
    RegisterProtocol(String),
}

/// Records every mutating call and keeps enough state to answer queries.
#[derive(Default)]
pub struct RecordingEngine {
    loading: Cell<bool>,
    waiters: RefCell<Vec<Box<dyn FnOnce()>>>,
    sources: RefCell<IndexMap<String, SourceSpec>>,
    layers: RefCell<IndexMap<String, SubLayerSpec>>,
    layout: RefCell<HashMap<(String, String), Value>>,
    listeners: RefCell<IndexMap<ListenerId, (PointerEventKind, String, PointerCallback)>>,
    markers: RefCell<IndexMap<String, (MarkerDefinition, MarkerCallbacks)>>,
    next_listener: Cell<u64>,
    failing: RefCell<HashSet<String>>,
    failing_protocols: RefCell<HashSet<String>>,
    calls: RefCell<Vec<Call>>,
}

impl RecordingEngine {
    /// An engine whose style is already loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine still loading its style.
    pub fn loading() -> Self {
        let engine = Self::default();
        engine.loading.set(true);
        engine
    }

    pub fn finish_style_load(&self) {
        self.loading.set(false);
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waiter in waiters {
            waiter();
        }
    }

    pub fn drop_style_waiters(&self) {
        self.waiters.borrow_mut().clear();
    }

    pub fn style_waiters(&self) -> usize {
        self.waiters.borrow().len()
    }

    /// Make `add_layer` fail for this sub-layer id.
    pub fn fail_layer(&self, id: &str) {
        self.failing.borrow_mut().insert(id.to_string());
    }

    /// Make `register_protocol` fail for this scheme.
    pub fn fail_protocol(&self, scheme: &str) {
        self.failing_protocols.borrow_mut().insert(scheme.to_string());
    }

    /// What a style switch does to runtime resources.
    pub fn drop_all_resources(&self) {
        self.sources.borrow_mut().clear();
        self.layers.borrow_mut().clear();
        self.layout.borrow_mut().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn source(&self, id: &str) -> Option<SourceSpec> {
        self.sources.borrow().get(id).cloned()
    }

    pub fn layer(&self, id: &str) -> Option<SubLayerSpec> {
        self.layers.borrow().get(id).cloned()
    }

    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.borrow().keys().cloned().collect()
    }

    pub fn layout(&self, layer: &str, name: &str) -> Option<Value> {
        self.layout.borrow().get(&(layer.to_string(), name.to_string())).cloned()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver `event` to every listener of `kind` on `layer`.
    pub fn fire(&self, kind: PointerEventKind, layer: &str, event: &PointerEvent) {
        let callbacks: Vec<PointerCallback> = self
            .listeners
            .borrow()
            .values()
            .filter(|(k, l, _)| *k == kind && l == layer)
            .map(|(_, _, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn marker(&self, id: &str) -> Option<MarkerDefinition> {
        self.markers.borrow().get(id).map(|(m, _)| m.clone())
    }

    pub fn marker_ids(&self) -> Vec<String> {
        self.markers.borrow().keys().cloned().collect()
    }

    pub fn drag_marker(&self, id: &str, phase: DragPhase, at: LngLat) {
        let callback = self.markers.borrow().get(id).and_then(|(_, cb)| cb.on_drag.clone());
        if let Some(callback) = callback {
            callback(phase, at);
        }
    }

    pub fn click_marker(&self, id: &str) {
        let callback = self.markers.borrow().get(id).and_then(|(_, cb)| cb.on_click.clone());
        if let Some(callback) = callback {
            callback();
        }
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl RenderEngine for RecordingEngine {
    fn is_style_loaded(&self) -> bool {
        !self.loading.get()
    }

    fn on_style_load(&self, callback: Box<dyn FnOnce()>) {
        self.waiters.borrow_mut().push(callback);
    }

    fn set_style(&self, url: &str) -> Result<(), EngineError> {
        self.record(Call::SetStyle(url.to_string()));
        self.drop_all_resources();
        self.loading.set(true);
        Ok(())
    }

    fn set_projection(&self, projection: Projection) -> Result<(), EngineError> {
        self.record(Call::SetProjection(projection));
        Ok(())
    }

    fn move_camera(&self, target: &CameraTarget) -> Result<(), EngineError> {
        self.record(Call::MoveCamera(*target));
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.borrow().contains_key(id)
    }

    fn add_source(&self, id: &str, source: &SourceSpec) -> Result<(), EngineError> {
        if self.loading.get() {
            return Err(EngineError::StyleNotLoaded);
        }
        if self.has_source(id) {
            return Err(EngineError::DuplicateSource(id.to_string()));
        }
        self.record(Call::AddSource(id.to_string()));
        self.sources.borrow_mut().insert(id.to_string(), source.clone());
        Ok(())
    }

    fn remove_source(&self, id: &str) -> Result<(), EngineError> {
        if self.layers.borrow().values().any(|l| l.source == id) {
            return Err(EngineError::Rejected(format!("source {} is still in use", id)));
        }
        if self.sources.borrow_mut().shift_remove(id).is_none() {
            return Err(EngineError::SourceNotFound(id.to_string()));
        }
        self.record(Call::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.borrow().contains_key(id)
    }

    fn add_layer(&self, layer: &SubLayerSpec) -> Result<(), EngineError> {
        if self.loading.get() {
            return Err(EngineError::StyleNotLoaded);
        }
        if self.failing.borrow().contains(&layer.id) {
            return Err(EngineError::Rejected(format!("bad paint for {}", layer.id)));
        }
        if self.has_layer(&layer.id) {
            return Err(EngineError::DuplicateLayer(layer.id.clone()));
        }
        if !self.has_source(&layer.source) {
            return Err(EngineError::SourceNotFound(layer.source.clone()));
        }
        self.record(Call::AddLayer(layer.id.clone()));
        self.layers.borrow_mut().insert(layer.id.clone(), layer.clone());
        Ok(())
    }

    fn remove_layer(&self, id: &str) -> Result<(), EngineError> {
        if self.layers.borrow_mut().shift_remove(id).is_none() {
            return Err(EngineError::LayerNotFound(id.to_string()));
        }
        self.record(Call::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn set_layout_property(&self, layer: &str, name: &str, value: Value) -> Result<(), EngineError> {
        if !self.has_layer(layer) {
            return Err(EngineError::LayerNotFound(layer.to_string()));
        }
        self.record(Call::SetLayout(layer.to_string(), name.to_string(), value.clone()));
        self.layout
            .borrow_mut()
            .insert((layer.to_string(), name.to_string()), value);
        Ok(())
    }

    fn on(&self, event: PointerEventKind, layer: &str, callback: PointerCallback) -> Result<ListenerId, EngineError> {
        let id = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(id.0);
        self.record(Call::On(event, layer.to_string()));
        self.listeners
            .borrow_mut()
            .insert(id, (event, layer.to_string(), callback));
        Ok(id)
    }

    fn off(&self, listener: ListenerId) {
        self.record(Call::Off(listener));
        self.listeners.borrow_mut().shift_remove(&listener);
    }

    fn add_marker(&self, id: &str, marker: &MarkerDefinition, callbacks: MarkerCallbacks) -> Result<(), EngineError> {
        self.record(Call::AddMarker(id.to_string()));
        self.markers
            .borrow_mut()
            .insert(id.to_string(), (marker.clone(), callbacks));
        Ok(())
    }

    fn set_marker_position(&self, id: &str, at: LngLat) -> Result<(), EngineError> {
        let mut markers = self.markers.borrow_mut();
        let (marker, _) = markers
            .get_mut(id)
            .ok_or_else(|| EngineError::Rejected(format!("no marker {}", id)))?;
        marker.coordinates = at;
        drop(markers);
        self.record(Call::MoveMarker(id.to_string(), at));
        Ok(())
    }

    fn update_marker(&self, id: &str, marker: &MarkerDefinition) -> Result<(), EngineError> {
        let mut markers = self.markers.borrow_mut();
        let (current, _) = markers
            .get_mut(id)
            .ok_or_else(|| EngineError::Rejected(format!("no marker {}", id)))?;
        *current = marker.clone();
        drop(markers);
        self.record(Call::UpdateMarker(id.to_string()));
        Ok(())
    }

    fn remove_marker(&self, id: &str) {
        self.record(Call::RemoveMarker(id.to_string()));
        self.markers.borrow_mut().shift_remove(id);
    }

    fn register_protocol(&self, scheme: &str) -> Result<(), EngineError> {
        self.record(Call::RegisterProtocol(scheme.to_string()));
        if self.failing_protocols.borrow().contains(scheme) {
            return Err(EngineError::Rejected(format!("cannot register {}://", scheme)));
        }
        Ok(())
    }
}

/// Answers every routing request with the same result.
pub struct FixedRoutes(pub Result<Vec<LngLat>, ResolveError>);

impl RouteResolver for FixedRoutes {
    fn resolve(&self, _waypoints: &[LngLat], _profile: RouteProfile) -> LocalBoxFuture<'static, Result<Vec<LngLat>, ResolveError>> {
        future::ready(self.0.clone()).boxed_local()
    }
}

/// Routing requests that stay pending until the test completes them.
#[derive(Default)]
pub struct DeferredRoutes {
    senders: RefCell<Vec<Option<oneshot::Sender<Result<Vec<LngLat>, ResolveError>>>>>,
}

impl DeferredRoutes {
    pub fn requested(&self) -> usize {
        self.senders.borrow().len()
    }

    pub fn complete(&self, index: usize, result: Result<Vec<LngLat>, ResolveError>) {
        if let Some(tx) = self.senders.borrow_mut().get_mut(index).and_then(Option::take) {
            let _ = tx.send(result);
        }
    }
}

impl RouteResolver for DeferredRoutes {
    fn resolve(&self, _waypoints: &[LngLat], _profile: RouteProfile) -> LocalBoxFuture<'static, Result<Vec<LngLat>, ResolveError>> {
        let (tx, rx) = oneshot::channel();
        self.senders.borrow_mut().push(Some(tx));
        rx.map(|r| r.unwrap_or_else(|_| Err(ResolveError::Network("request dropped".into()))))
            .boxed_local()
    }
}

pub struct FixedColumnar(pub Result<ColumnarTable, ResolveError>);

impl ColumnarLoader for FixedColumnar {
    fn load(&self, _url: &str, _geometry_column: Option<&str>) -> LocalBoxFuture<'static, Result<ColumnarTable, ResolveError>> {
        future::ready(self.0.clone()).boxed_local()
    }
}

pub struct FixedMetadata(pub Result<TileMetadata, ResolveError>);

impl TileMetadataLoader for FixedMetadata {
    fn load(&self, _url: &str) -> LocalBoxFuture<'static, Result<TileMetadata, ResolveError>> {
        future::ready(self.0.clone()).boxed_local()
    }
}

#[derive(Default)]
pub struct RecordingAnalytics(RefCell<Vec<String>>);

impl RecordingAnalytics {
    pub fn dropped(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

impl AnalyticsTables for RecordingAnalytics {
    fn drop_table(&self, id: &str) {
        self.0.borrow_mut().push(id.to_string());
    }
}
