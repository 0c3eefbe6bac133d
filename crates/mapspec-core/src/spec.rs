use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraTarget, CameraView, LngLat, LngLatBounds, Projection};
use crate::layer::LayerDefinition;
use crate::marker::MarkerDefinition;

/// Top-level fields that hold id-keyed maps of entries.
pub const NAMED_MAP_FIELDS: [&str; 4] = ["markers", "layers", "legends", "widgets"];

/// The declarative description of one map's desired state.
///
/// A `Specification` is an immutable snapshot: every patch produces a new
/// one. Runtime resources never live here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Specification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basemap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<LngLat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<LngLatBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub markers: IndexMap<String, MarkerDefinition>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub layers: IndexMap<String, LayerDefinition>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub legends: IndexMap<String, LegendDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<ControlsBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub widgets: IndexMap<String, WidgetDefinition>,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the camera should be. A bounding box wins over an explicit view.
    pub fn camera_target(&self) -> Option<CameraTarget> {
        if let Some(bounds) = self.bounds {
            return Some(CameraTarget::Fit {
                bounds,
                padding: 40.0,
            });
        }
        if self.center.is_none() && self.zoom.is_none() && self.pitch.is_none() && self.bearing.is_none()
        {
            return None;
        }
        let defaults = CameraView::default();
        Some(CameraTarget::View(
            CameraView {
                center: self.center.unwrap_or(defaults.center),
                zoom: self.zoom.unwrap_or(defaults.zoom),
                pitch: self.pitch.unwrap_or(defaults.pitch),
                bearing: self.bearing.unwrap_or(defaults.bearing),
            }
            .clamped(),
        ))
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Screen corner for overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A legend describing one layer's styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendDefinition {
    /// Id of the layer the legend describes.
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub position: Corner,
}

/// Toggles for the built-in map controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsBlock {
    pub zoom: bool,
    pub compass: bool,
    pub fullscreen: bool,
    pub locate: bool,
    pub basemap_switcher: bool,
    pub search: bool,
    pub layer_switcher: bool,
    pub position: Corner,
}

/// Aggregation shown by a stat card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    #[default]
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

/// A stat card computed over one layer's tabular data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDefinition {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub stat: StatKind,
    /// Literal value shown when no layer/column is bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub position: Corner,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_spec() {
        let spec = Specification::from_json("{}").unwrap();
        assert_eq!(spec, Specification::new());
        assert!(spec.camera_target().is_none());
        assert_eq!(spec.to_json().unwrap(), "{}");
    }

    #[test]
    fn test_layer_order_preserved() {
        let spec: Specification = serde_json::from_value(json!({
            "layers": {
                "zeta": {"type": "raster", "tiles": ["https://t/{z}/{x}/{y}.png"]},
                "alpha": {"type": "route", "coordinates": [[0, 0], [1, 1]]}
            }
        }))
        .unwrap();
        let ids: Vec<&str> = spec.layers.keys().map(String::as_str).collect();
        assert_eq!(ids, ["zeta", "alpha"]);
    }

    #[test]
    fn test_camera_target_bounds_win() {
        let spec: Specification = serde_json::from_value(json!({
            "center": [10, 20],
            "zoom": 5,
            "bounds": [0, 0, 1, 1]
        }))
        .unwrap();
        assert!(matches!(spec.camera_target(), Some(CameraTarget::Fit { .. })));
    }

    #[test]
    fn test_camera_target_view_defaults() {
        let spec: Specification = serde_json::from_value(json!({"zoom": 7})).unwrap();
        let Some(CameraTarget::View(view)) = spec.camera_target() else {
            panic!("expected view");
        };
        assert_eq!(view.zoom, 7.0);
        assert_eq!(view.center, [0.0, 0.0]);
    }

    #[test]
    fn test_controls_and_widgets() {
        let spec: Specification = serde_json::from_value(json!({
            "controls": {"zoom": true, "position": "bottom-left"},
            "legends": {"l1": {"layer": "roads", "title": "Roads"}},
            "widgets": {"w": {"title": "Count", "layer": "roads", "stat": "count"}}
        }))
        .unwrap();
        let controls = spec.controls.unwrap();
        assert!(controls.zoom && !controls.search);
        assert_eq!(controls.position, Corner::BottomLeft);
        assert_eq!(spec.legends["l1"].position, Corner::TopRight);
        assert_eq!(spec.widgets["w"].stat, StatKind::Count);
    }
}
