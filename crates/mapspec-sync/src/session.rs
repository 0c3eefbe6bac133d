//! One renderer's view state: basemap, projection, camera, markers and layers.

use std::rc::Rc;

use mapspec_core::{CameraTarget, Projection, RenderSettings, Specification};

use crate::engine::RenderEngine;
use crate::events::{EventSink, SinkCell};
use crate::layer_sync::{LayerSync, LayerSyncBuilder, PassReport};
use crate::marker_sync::{MarkerReport, MarkerSync};

/// What one [`MapSession::update`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub style_changed: bool,
    pub projection_changed: bool,
    pub camera_moved: bool,
    pub markers: MarkerReport,
    pub layers: PassReport,
}

pub struct MapSession {
    engine: Option<Rc<dyn RenderEngine>>,
    settings: Rc<RenderSettings>,
    layers: LayerSync,
    markers: MarkerSync,
    style_url: Option<String>,
    projection: Projection,
    camera: Option<CameraTarget>,
}

impl MapSession {
    /// Attach a freshly created renderer. Marker events share the layer
    /// sync's event cell.
    pub fn new(engine: Rc<dyn RenderEngine>, layers: LayerSyncBuilder) -> Self {
        let layers = layers.build(engine.clone());
        let settings = layers.settings().clone();
        let markers = MarkerSync::new(layers.events());
        Self {
            engine: Some(engine),
            settings,
            layers,
            markers,
            style_url: None,
            projection: Projection::Mercator,
            camera: None,
        }
    }

    /// The style the renderer was created with, so the first update does
    /// not reload it.
    pub fn with_style(mut self, url: impl Into<String>) -> Self {
        self.style_url = Some(url.into());
        self
    }

    /// Bring the renderer in line with `spec`.
    pub fn update(&mut self, spec: &Specification) -> SessionReport {
        let mut report = SessionReport::default();
        let Some(engine) = self.engine.clone() else {
            log::debug!("No renderer attached, ignoring update");
            return report;
        };

        let style_url = self.settings.style_url(spec.basemap.as_deref());
        if self.style_url.as_deref() != Some(style_url.as_str()) {
            match engine.set_style(&style_url) {
                Ok(()) => {
                    log::info!("Switched style to {}", style_url);
                    self.style_url = Some(style_url);
                    self.layers.invalidate();
                    report.style_changed = true;
                }
                Err(e) => log::warn!("Failed to switch style to {}: {}", style_url, e),
            }
        }

        let projection = spec.projection.unwrap_or(Projection::Mercator);
        if projection != self.projection {
            match engine.set_projection(projection) {
                Ok(()) => {
                    self.projection = projection;
                    report.projection_changed = true;
                }
                Err(e) => log::warn!("Failed to set projection {}: {}", projection.as_str(), e),
            }
        }

        if let Some(target) = spec.camera_target() {
            if self.camera != Some(target) {
                match engine.move_camera(&target) {
                    Ok(()) => {
                        self.camera = Some(target);
                        report.camera_moved = true;
                    }
                    Err(e) => log::warn!("Failed to move camera: {}", e),
                }
            }
        }

        report.markers = self.markers.sync(engine.as_ref(), &spec.markers);
        report.layers = self.layers.reconcile(spec);
        report
    }

    /// Replace the renderer. Everything is re-created on the next update.
    pub fn attach(&mut self, engine: Rc<dyn RenderEngine>) {
        self.markers.forget();
        self.layers.attach(engine.clone());
        self.engine = Some(engine);
        self.style_url = None;
        self.projection = Projection::Mercator;
        self.camera = None;
    }

    /// Drop the renderer (unmount). Out-of-band work discards itself.
    pub fn detach(&mut self) {
        self.markers.forget();
        self.layers.detach();
        self.engine = None;
        self.camera = None;
    }

    pub fn set_event_sink(&self, sink: Option<EventSink>) {
        self.layers.set_event_sink(sink);
    }

    pub fn events(&self) -> SinkCell {
        self.layers.events()
    }

    pub fn layers(&self) -> &LayerSync {
        &self.layers
    }

    pub fn markers(&self) -> &MarkerSync {
        &self.markers
    }
}
