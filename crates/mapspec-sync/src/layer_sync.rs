//! Signature-diff reconciliation of logical layers against the engine.
//!
//! One pass runs to completion synchronously: every removal first, then
//! additions in the specification's order. Kinds that need network or
//! parse work are resolved out of band while their id sits in the pending
//! set; the result lands later only if both the renderer instance and the
//! pending ticket are still current.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use serde_json::json;
use thiserror::Error;

use mapspec_core::{LayerCommon, LayerDefinition, LayerKind, RenderSettings, Signature, SignatureCache, Specification};

use crate::archive::{ArchiveProtocol, ARCHIVE_PROTOCOL};
use crate::engine::{
    EngineError, EngineSlot, PointerCallback, PointerEvent, PointerEventKind, RenderEngine,
};
use crate::events::{dispatch, EventSink, MapEvent, SinkCell};
use crate::handlers::{self, sub_layer_id, Draw, Plan, PlanContext, SUFFIXES};
use crate::latest::LatestCell;
use crate::pending::{PendingSet, Ticket};
use crate::ready::style_ready;
use crate::registry::HandlerRegistry;
use crate::resolve::Resolvers;
use crate::tabular::{AnalyticsTables, TableData, TabularCache};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Cannot compute signature: {0}")]
    Signature(#[from] serde_json::Error),

    #[error("Invalid layer definition: {0}")]
    InvalidDefinition(String),

    #[error("Layer {0} names no source layer and has no TileJSON url to discover one")]
    MissingSourceLayer(String),

    #[error("No {0} configured")]
    NotConfigured(&'static str),

    #[error("Failed to spawn background work: {0}")]
    Spawn(#[from] SpawnError),
}

/// The live engine resources for one layer id.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeLayerHandle {
    pub kind: LayerKind,
    pub source: String,
    pub sub_layers: Vec<String>,
}

/// What one pass did, per layer id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub removed: Vec<String>,
    /// Drawn during this pass.
    pub added: Vec<String>,
    /// Resolving out of band.
    pub pending: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    /// The style was not loaded; the pass will rerun once it is.
    pub deferred: bool,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.pending.is_empty() && self.failed.is_empty()
    }
}

#[derive(Default)]
struct LayerState {
    signatures: SignatureCache,
    handles: HashMap<String, RuntimeLayerHandle>,
    registry: HandlerRegistry,
    pending: PendingSet,
    tables: TabularCache,
}

enum Added {
    Drawn,
    Pending,
}

struct Inner {
    slot: EngineSlot,
    settings: Rc<RenderSettings>,
    resolvers: Resolvers,
    archive: &'static ArchiveProtocol,
    spawner: Rc<dyn LocalSpawn>,
    state: RefCell<LayerState>,
    events: SinkCell,
    latest: LatestCell<Option<Rc<Specification>>>,
    retry_scheduled: Cell<bool>,
}

pub struct LayerSyncBuilder {
    settings: Rc<RenderSettings>,
    spawner: Rc<dyn LocalSpawn>,
    resolvers: Resolvers,
    analytics: Option<Rc<dyn AnalyticsTables>>,
    archive: &'static ArchiveProtocol,
    events: SinkCell,
}

impl LayerSyncBuilder {
    pub fn with_resolvers(mut self, resolvers: Resolvers) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn with_analytics(mut self, analytics: Rc<dyn AnalyticsTables>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn with_archive_protocol(mut self, archive: &'static ArchiveProtocol) -> Self {
        self.archive = archive;
        self
    }

    /// Share an event cell, e.g. with marker sync.
    pub fn with_events(mut self, events: SinkCell) -> Self {
        self.events = events;
        self
    }

    pub fn build(self, engine: Rc<dyn RenderEngine>) -> LayerSync {
        let mut tables = TabularCache::new();
        if let Some(analytics) = self.analytics {
            tables = tables.with_analytics(analytics);
        }
        let slot = EngineSlot::new();
        slot.attach(engine);
        LayerSync {
            inner: Rc::new(Inner {
                slot,
                settings: self.settings,
                resolvers: self.resolvers,
                archive: self.archive,
                spawner: self.spawner,
                state: RefCell::new(LayerState {
                    tables,
                    ..LayerState::default()
                }),
                events: self.events,
                latest: LatestCell::new(None),
                retry_scheduled: Cell::new(false),
            }),
        }
    }
}

/// Keeps the engine's sources, sub-layers and listeners in line with the
/// layer map of successive specifications.
///
/// Out-of-band work runs on `spawner`, which must queue tasks rather than
/// poll them inline.
pub struct LayerSync {
    inner: Rc<Inner>,
}

impl LayerSync {
    pub fn builder(settings: Rc<RenderSettings>, spawner: Rc<dyn LocalSpawn>) -> LayerSyncBuilder {
        LayerSyncBuilder {
            settings,
            spawner,
            resolvers: Resolvers::default(),
            analytics: None,
            archive: &ARCHIVE_PROTOCOL,
            events: SinkCell::default(),
        }
    }

    /// Run one reconciliation pass against `spec.layers`.
    pub fn reconcile(&self, spec: &Specification) -> PassReport {
        self.inner.reconcile(spec)
    }

    /// Replace the renderer instance. Work started for the previous one
    /// discards itself when it lands.
    pub fn attach(&self, engine: Rc<dyn RenderEngine>) {
        self.inner.slot.attach(engine);
        self.inner.retry_scheduled.set(false);
        self.inner.reset(None);
    }

    /// Drop the renderer instance (unmount).
    pub fn detach(&self) {
        self.inner.slot.detach();
        self.inner.reset(None);
    }

    /// Forget every runtime handle after the engine dropped them itself,
    /// as on a style switch. The next pass re-adds everything.
    pub fn invalidate(&self) {
        let engine = self.inner.slot.get().map(|(_, engine)| engine);
        self.inner.reset(engine.as_deref());
    }

    pub fn events(&self) -> SinkCell {
        self.inner.events.clone()
    }

    pub fn settings(&self) -> &Rc<RenderSettings> {
        &self.inner.settings
    }

    pub fn set_event_sink(&self, sink: Option<EventSink>) {
        self.inner.events.set(sink);
    }

    pub fn handle(&self, id: &str) -> Option<RuntimeLayerHandle> {
        self.inner.state.borrow().handles.get(id).cloned()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.state.borrow().pending.contains(id)
    }

    pub fn table(&self, id: &str) -> Option<Rc<TableData>> {
        self.inner.state.borrow().tables.get(id)
    }

    pub fn listener_count(&self, id: &str) -> usize {
        self.inner.state.borrow().registry.registrations(id).len()
    }

    /// Ids with live engine resources, sorted.
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.state.borrow().handles.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Inner {
    fn reconcile(self: &Rc<Self>, spec: &Specification) -> PassReport {
        let mut report = PassReport::default();
        self.latest.set(Some(Rc::new(spec.clone())));

        let Some((token, engine)) = self.slot.get() else {
            log::debug!("No renderer attached, skipping layer pass");
            return report;
        };
        if !engine.is_style_loaded() {
            report.deferred = true;
            self.schedule_retry(token, engine.as_ref());
            return report;
        }

        let mut state = self.state.borrow_mut();
        for id in state.signatures.stale_ids(spec.layers.keys()) {
            self.remove_layer(&mut state, engine.as_ref(), &id);
            state.signatures.forget(&id);
            report.removed.push(id);
        }

        for (id, def) in &spec.layers {
            let signature = match Signature::of(def) {
                Ok(signature) => signature,
                Err(e) => {
                    log::warn!("Skipping layer {}: {}", id, e);
                    report.failed.push(id.clone());
                    continue;
                }
            };
            let live = state.handles.contains_key(id) || state.pending.contains(id);
            if live && state.signatures.matches(id, &signature) {
                report.skipped.push(id.clone());
                continue;
            }
            if live {
                self.remove_layer(&mut state, engine.as_ref(), id);
            }
            state.signatures.record(id, signature);

            match self.add_layer(&mut state, token, engine.as_ref(), id, def) {
                Ok(Added::Drawn) => report.added.push(id.clone()),
                Ok(Added::Pending) => report.pending.push(id.clone()),
                Err(e) => {
                    log::warn!("Failed to add {} layer {}: {}", def.kind(), id, e);
                    self.remove_layer(&mut state, engine.as_ref(), id);
                    report.failed.push(id.clone());
                }
            }
        }

        if !report.is_noop() {
            log::info!(
                "Layer pass: {} removed, {} added, {} pending, {} unchanged, {} failed",
                report.removed.len(),
                report.added.len(),
                report.pending.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        report
    }

    /// Park one retry on the style-ready future. Concurrent requests
    /// coalesce; the retry runs against the latest specification. A retry
    /// parked for a replaced renderer wakes as a no-op and leaves the flag
    /// to the current renderer's retry.
    fn schedule_retry(self: &Rc<Self>, token: u64, engine: &dyn RenderEngine) {
        if self.retry_scheduled.replace(true) {
            log::debug!("Style not loaded, retry already scheduled");
            return;
        }
        log::info!("Style not loaded, deferring layer pass until it is");
        let ready = style_ready(engine);
        let weak = Rc::downgrade(self);
        let spawned = self.spawner.spawn_local(async move {
            let loaded = ready.await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.slot.is_current(token) {
                log::debug!("Dropping layer pass retry for a replaced renderer");
                return;
            }
            inner.retry_scheduled.set(false);
            if !loaded {
                log::warn!("Style load notification was dropped, layer pass not rerun");
                return;
            }
            if let Some(spec) = inner.latest.get() {
                inner.reconcile(&spec);
            }
        });
        if let Err(e) = spawned {
            log::warn!("Cannot schedule layer pass retry: {}", e);
            self.retry_scheduled.set(false);
        }
    }

    fn add_layer(
        self: &Rc<Self>,
        state: &mut LayerState,
        token: u64,
        engine: &dyn RenderEngine,
        id: &str,
        def: &LayerDefinition,
    ) -> Result<Added, SyncError> {
        let ctx = PlanContext {
            settings: &self.settings,
            resolvers: &self.resolvers,
            archive: self.archive,
            engine,
        };
        match handlers::plan(id, def, &ctx)? {
            Plan::Ready(draw) => {
                self.install(state, engine, id, def.common(), def.kind(), draw)?;
                Ok(Added::Drawn)
            }
            Plan::Deferred(work) => {
                let ticket = state.pending.begin(id);
                let weak = Rc::downgrade(self);
                let owned_id = id.to_string();
                let def = def.clone();
                let spawned = self.spawner.spawn_local(async move {
                    let draw = work.await;
                    if let Some(inner) = weak.upgrade() {
                        inner.land(token, ticket, &owned_id, &def, draw);
                    }
                });
                if let Err(e) = spawned {
                    state.pending.cancel(id);
                    return Err(e.into());
                }
                log::debug!("Layer {} resolving out of band", id);
                Ok(Added::Pending)
            }
        }
    }

    /// Apply an out-of-band result if it is still wanted.
    fn land(&self, token: u64, ticket: Ticket, id: &str, def: &LayerDefinition, draw: Option<Draw>) {
        if !self.slot.is_current(token) {
            log::debug!("Discarding result for layer {}: renderer was replaced", id);
            return;
        }
        let Some((_, engine)) = self.slot.get() else {
            return;
        };
        let mut state = self.state.borrow_mut();
        if !state.pending.finish(id, ticket) {
            log::debug!("Discarding stale result for layer {}", id);
            return;
        }
        let Some(draw) = draw else {
            log::info!("Layer {} left absent", id);
            return;
        };
        match self.install(&mut state, engine.as_ref(), id, def.common(), def.kind(), draw) {
            Ok(()) => log::info!("Layer {} resolved and drawn", id),
            Err(e) => {
                log::warn!("Failed to draw resolved layer {}: {}", id, e);
                self.remove_layer(&mut state, engine.as_ref(), id);
            }
        }
    }

    fn install(
        &self,
        state: &mut LayerState,
        engine: &dyn RenderEngine,
        id: &str,
        common: &LayerCommon,
        kind: LayerKind,
        draw: Draw,
    ) -> Result<(), SyncError> {
        engine.add_source(id, &draw.source)?;
        let mut handle = RuntimeLayerHandle {
            kind,
            source: id.to_string(),
            sub_layers: Vec::with_capacity(draw.sub_layers.len()),
        };
        for layer in &draw.sub_layers {
            engine.add_layer(layer)?;
            handle.sub_layers.push(layer.id.clone());
            if !common.visible {
                engine.set_layout_property(&layer.id, "visibility", json!("none"))?;
            }
        }
        if common.is_interactive() {
            for sub_layer in &draw.interactive {
                self.attach_listeners(state, engine, id, sub_layer, common)?;
            }
        }
        if let Some(table) = draw.table {
            state.tables.insert(id, table);
        }
        log::debug!("Drew {} layer {} ({} sub-layers)", kind, id, handle.sub_layers.len());
        state.handles.insert(id.to_string(), handle);
        Ok(())
    }

    /// Register hover and click listeners, recording each as it is created.
    fn attach_listeners(
        &self,
        state: &mut LayerState,
        engine: &dyn RenderEngine,
        id: &str,
        sub_layer: &str,
        common: &LayerCommon,
    ) -> Result<(), SyncError> {
        let mut listen = |event: PointerEventKind, callback: PointerCallback| -> Result<(), SyncError> {
            let listener = engine.on(event, sub_layer, callback)?;
            state.registry.register(id, event, sub_layer, listener);
            Ok(())
        };

        if let Some(tooltip) = &common.tooltip {
            let hover: PointerCallback = {
                let events = self.events.clone();
                let tooltip = tooltip.clone();
                let layer = id.to_string();
                Rc::new(move |e: &PointerEvent| {
                    dispatch(
                        &events,
                        MapEvent::Hover {
                            layer: layer.clone(),
                            text: tooltip.render(&e.properties),
                            lnglat: e.lnglat,
                        },
                    )
                })
            };
            listen(PointerEventKind::MouseEnter, hover.clone())?;
            listen(PointerEventKind::MouseMove, hover)?;

            let events = self.events.clone();
            let layer = id.to_string();
            listen(
                PointerEventKind::MouseLeave,
                Rc::new(move |_: &PointerEvent| dispatch(&events, MapEvent::HoverEnd { layer: layer.clone() })),
            )?;
        }

        if common.clickable {
            let events = self.events.clone();
            let layer = id.to_string();
            listen(
                PointerEventKind::Click,
                Rc::new(move |e: &PointerEvent| {
                    dispatch(
                        &events,
                        MapEvent::Click {
                            layer: layer.clone(),
                            properties: e.properties.clone(),
                            lnglat: e.lnglat,
                        },
                    )
                }),
            )?;
        }
        Ok(())
    }

    /// Release everything held for `id`. Best effort: absent resources are fine.
    fn remove_layer(&self, state: &mut LayerState, engine: &dyn RenderEngine, id: &str) {
        state.pending.cancel(id);
        for registration in state.registry.take(id) {
            engine.off(registration.listener);
        }
        for suffix in SUFFIXES.iter().rev() {
            let sub_layer = sub_layer_id(id, suffix);
            if engine.has_layer(&sub_layer) {
                if let Err(e) = engine.remove_layer(&sub_layer) {
                    log::warn!("Failed to remove sub-layer {}: {}", sub_layer, e);
                }
            }
        }
        if engine.has_source(id) {
            match engine.remove_source(id) {
                Ok(()) | Err(EngineError::SourceNotFound(_)) => {}
                Err(e) => log::warn!("Failed to remove source {}: {}", id, e),
            }
        }
        state.tables.evict(id);
        state.handles.remove(id);
    }

    /// Forget all runtime state. Listeners are unregistered on `engine` when given.
    fn reset(&self, engine: Option<&dyn RenderEngine>) {
        let mut state = self.state.borrow_mut();
        for registration in state.registry.drain() {
            if let Some(engine) = engine {
                engine.off(registration.listener);
            }
        }
        for id in state.tables.ids() {
            state.tables.evict(&id);
        }
        state.handles.clear();
        state.signatures.clear();
        state.pending.clear();
    }
}
