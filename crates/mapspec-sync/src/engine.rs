//! The capability surface of the embedded rendering engine.
//!
//! Sync components only ever talk to the engine through [`RenderEngine`];
//! the engine itself (style loading, tiling, drawing) is external.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use mapspec_core::{CameraTarget, LngLat, MarkerDefinition, Projection};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Source already exists: {0}")]
    DuplicateSource(String),

    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),

    #[error("Style is not loaded")]
    StyleNotLoaded,

    #[error("Engine rejected the call: {0}")]
    Rejected(String),
}

/// Clustering parameters for a GeoJSON source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterSettings {
    pub radius: f64,
    pub max_zoom: f64,
}

/// A data source, keyed by the logical layer id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    /// `data` is either a URL string or an inline GeoJSON object.
    GeoJson {
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        cluster: Option<ClusterSettings>,
    },
    Vector {
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tiles: Option<Vec<String>>,
    },
    Raster {
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tiles: Option<Vec<String>>,
        tile_size: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        attribution: Option<String>,
    },
}

/// How a sub-layer draws its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubLayerKind {
    Fill,
    Line,
    Circle,
    Symbol,
    Heatmap,
    Raster,
}

/// One drawable unit belonging to a logical layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubLayerSpec {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: SubLayerKind,
    #[serde(rename = "source-layer", skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    pub paint: Map<String, Value>,
    pub layout: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl SubLayerSpec {
    pub fn new(id: String, source: &str, kind: SubLayerKind) -> Self {
        Self {
            id,
            source: source.to_string(),
            kind,
            source_layer: None,
            paint: Map::new(),
            layout: Map::new(),
            filter: None,
        }
    }

    pub fn with_paint(mut self, paint: Map<String, Value>) -> Self {
        self.paint = paint;
        self
    }

    pub fn with_layout(mut self, layout: Map<String, Value>) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_source_layer(mut self, source_layer: Option<String>) -> Self {
        self.source_layer = source_layer;
        self
    }
}

/// Pointer events a listener can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    MouseEnter,
    MouseMove,
    MouseLeave,
    Click,
}

impl PointerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerEventKind::MouseEnter => "mouseenter",
            PointerEventKind::MouseMove => "mousemove",
            PointerEventKind::MouseLeave => "mouseleave",
            PointerEventKind::Click => "click",
        }
    }
}

/// What the engine reports to a pointer listener.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointerEvent {
    pub lnglat: LngLat,
    /// Properties of the topmost feature under the pointer, if any.
    pub properties: Map<String, Value>,
}

pub type PointerCallback = Rc<dyn Fn(&PointerEvent)>;

/// Engine-issued handle used to unregister a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Start,
    Move,
    End,
}

/// Callbacks wired to one marker element.
#[derive(Clone, Default)]
pub struct MarkerCallbacks {
    pub on_click: Option<Rc<dyn Fn()>>,
    pub on_drag: Option<Rc<dyn Fn(DragPhase, LngLat)>>,
}

/// The rendering engine adapter.
///
/// Every source and sub-layer mutation requires a fully loaded style.
/// `register_protocol` is library-wide rather than per instance.
pub trait RenderEngine {
    fn is_style_loaded(&self) -> bool;
    /// One-shot notification for the next time the style finishes loading.
    fn on_style_load(&self, callback: Box<dyn FnOnce()>);
    fn set_style(&self, url: &str) -> Result<(), EngineError>;
    fn set_projection(&self, projection: Projection) -> Result<(), EngineError>;
    fn move_camera(&self, target: &CameraTarget) -> Result<(), EngineError>;

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&self, id: &str, source: &SourceSpec) -> Result<(), EngineError>;
    fn remove_source(&self, id: &str) -> Result<(), EngineError>;

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&self, layer: &SubLayerSpec) -> Result<(), EngineError>;
    fn remove_layer(&self, id: &str) -> Result<(), EngineError>;
    fn set_layout_property(&self, layer: &str, name: &str, value: Value) -> Result<(), EngineError>;

    fn on(&self, event: PointerEventKind, layer: &str, callback: PointerCallback) -> Result<ListenerId, EngineError>;
    fn off(&self, listener: ListenerId);

    fn add_marker(&self, id: &str, marker: &MarkerDefinition, callbacks: MarkerCallbacks) -> Result<(), EngineError>;
    fn set_marker_position(&self, id: &str, at: LngLat) -> Result<(), EngineError>;
    /// Refresh label, hover text, popup and draggability in place.
    fn update_marker(&self, id: &str, marker: &MarkerDefinition) -> Result<(), EngineError>;
    fn remove_marker(&self, id: &str);

    fn register_protocol(&self, scheme: &str) -> Result<(), EngineError>;
}

/// The engine instance currently owned by the sync components.
///
/// Every attach issues a new token; work that started under one token
/// must not touch the engine once the token is no longer current.
#[derive(Default)]
pub struct EngineSlot {
    current: RefCell<Option<(u64, Rc<dyn RenderEngine>)>>,
    next_token: Cell<u64>,
}

impl EngineSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, engine: Rc<dyn RenderEngine>) -> u64 {
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        *self.current.borrow_mut() = Some((token, engine));
        token
    }

    pub fn detach(&self) -> Option<Rc<dyn RenderEngine>> {
        self.current.borrow_mut().take().map(|(_, engine)| engine)
    }

    pub fn get(&self) -> Option<(u64, Rc<dyn RenderEngine>)> {
        self.current.borrow().clone()
    }

    pub fn token(&self) -> Option<u64> {
        self.current.borrow().as_ref().map(|(token, _)| *token)
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.token() == Some(token)
    }
}
