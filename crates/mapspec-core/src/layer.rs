use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::camera::LngLat;

/// One logical map layer. The `type` tag selects the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayerDefinition {
    /// Inline or remote GeoJSON points, lines and polygons.
    Geojson(FeatureLayer),
    /// A path drawn from literal coordinates or resolved by a routing service.
    Route(RouteLayer),
    /// Point-density heat surface.
    Heatmap(HeatmapLayer),
    /// Remote vector tiles.
    VectorTile(VectorTileLayer),
    /// Remote raster tiles.
    Raster(RasterLayer),
    /// A columnar geospatial file fetched and parsed off the render path.
    Geoparquet(GeoParquetLayer),
    /// Tiles packaged in a single archive served through a custom scheme.
    Pmtiles(PmTilesLayer),
}

/// Discriminant of [`LayerDefinition`], used for logging and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Geojson,
    Route,
    Heatmap,
    VectorTile,
    Raster,
    Geoparquet,
    Pmtiles,
}

impl LayerKind {
    pub const ALL: [LayerKind; 7] = [
        LayerKind::Geojson,
        LayerKind::Route,
        LayerKind::Heatmap,
        LayerKind::VectorTile,
        LayerKind::Raster,
        LayerKind::Geoparquet,
        LayerKind::Pmtiles,
    ];

    /// The `type` tag used in the document.
    pub fn tag(&self) -> &'static str {
        match self {
            LayerKind::Geojson => "geojson",
            LayerKind::Route => "route",
            LayerKind::Heatmap => "heatmap",
            LayerKind::VectorTile => "vector-tile",
            LayerKind::Raster => "raster",
            LayerKind::Geoparquet => "geoparquet",
            LayerKind::Pmtiles => "pmtiles",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl LayerDefinition {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerDefinition::Geojson(_) => LayerKind::Geojson,
            LayerDefinition::Route(_) => LayerKind::Route,
            LayerDefinition::Heatmap(_) => LayerKind::Heatmap,
            LayerDefinition::VectorTile(_) => LayerKind::VectorTile,
            LayerDefinition::Raster(_) => LayerKind::Raster,
            LayerDefinition::Geoparquet(_) => LayerKind::Geoparquet,
            LayerDefinition::Pmtiles(_) => LayerKind::Pmtiles,
        }
    }

    pub fn common(&self) -> &LayerCommon {
        match self {
            LayerDefinition::Geojson(l) => &l.common,
            LayerDefinition::Route(l) => &l.common,
            LayerDefinition::Heatmap(l) => &l.common,
            LayerDefinition::VectorTile(l) => &l.common,
            LayerDefinition::Raster(l) => &l.common,
            LayerDefinition::Geoparquet(l) => &l.common,
            LayerDefinition::Pmtiles(l) => &l.common,
        }
    }

    pub fn style(&self) -> LayerStyle {
        self.common().style.clone().unwrap_or_default()
    }
}

/// Fields every layer kind accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCommon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<LayerStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clickable: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl Default for LayerCommon {
    fn default() -> Self {
        Self {
            style: None,
            tooltip: None,
            clickable: false,
            visible: true,
            label: None,
        }
    }
}

impl LayerCommon {
    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_tooltip(mut self, tooltip: Tooltip) -> Self {
        self.tooltip = Some(tooltip);
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    /// Whether any pointer listener is needed for this layer.
    pub fn is_interactive(&self) -> bool {
        self.tooltip.is_some() || self.clickable
    }
}

/// Shared optional style block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<ColorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

/// A literal color or a data-driven mapping from a feature property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Literal(String),
    /// Exact property value → color.
    Categorical {
        property: String,
        categories: IndexMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    /// Linear interpolation over numeric `(value, color)` stops.
    Graduated {
        property: String,
        stops: Vec<(f64, String)>,
    },
}

impl ColorSpec {
    pub fn literal(color: &str) -> Self {
        ColorSpec::Literal(color.to_string())
    }

    pub fn is_data_driven(&self) -> bool {
        !matches!(self, ColorSpec::Literal(_))
    }
}

/// Hover tooltip: a list of property names or a `{property}` template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tooltip {
    Fields(Vec<String>),
    Template(String),
}

impl Tooltip {
    /// Render the tooltip text for one feature's properties.
    pub fn render(&self, properties: &serde_json::Map<String, Value>) -> String {
        match self {
            Tooltip::Fields(fields) => fields
                .iter()
                .filter_map(|f| properties.get(f).map(|v| format!("{}: {}", f, display_value(v))))
                .collect::<Vec<_>>()
                .join("\n"),
            Tooltip::Template(template) => {
                let mut out = String::with_capacity(template.len());
                let mut rest = template.as_str();
                while let Some(start) = rest.find('{') {
                    out.push_str(&rest[..start]);
                    match rest[start..].find('}') {
                        Some(end) => {
                            let key = &rest[start + 1..start + end];
                            if let Some(v) = properties.get(key) {
                                out.push_str(&display_value(v));
                            }
                            rest = &rest[start + end + 1..];
                        }
                        None => {
                            out.push_str(&rest[start..]);
                            rest = "";
                        }
                    }
                }
                out.push_str(rest);
                out
            }
        }
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// GeoJSON payload: a URL to fetch or an inline object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeoJsonData {
    Url(String),
    Inline(Value),
}

impl GeoJsonData {
    /// Feature property maps of an inline FeatureCollection or Feature.
    pub fn feature_properties(&self) -> Vec<serde_json::Map<String, Value>> {
        let GeoJsonData::Inline(value) = self else {
            return Vec::new();
        };
        let features: Vec<&Value> = match value.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => value
                .get("features")
                .and_then(Value::as_array)
                .map(|a| a.iter().collect())
                .unwrap_or_default(),
            Some("Feature") => vec![value],
            _ => Vec::new(),
        };
        features
            .into_iter()
            .map(|f| {
                f.get("properties")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayer {
    pub data: GeoJsonData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterOptions>,
    #[serde(flatten)]
    pub common: LayerCommon,
}

/// Travel profile for routed paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteProfile {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl RouteProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteProfile::Driving => "driving",
            RouteProfile::Walking => "walking",
            RouteProfile::Cycling => "cycling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLayer {
    /// Points the routing service must pass through.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waypoints: Vec<LngLat>,
    /// Literal geometry. When present, no routing is performed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<LngLat>>,
    #[serde(default)]
    pub profile: RouteProfile,
    #[serde(flatten)]
    pub common: LayerCommon,
}

impl RouteLayer {
    pub fn is_manual(&self) -> bool {
        self.coordinates.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapLayer {
    pub data: GeoJsonData,
    /// Numeric feature property used as point weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(flatten)]
    pub common: LayerCommon,
}

/// Geometry treatment for tiled vector data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorRender {
    #[default]
    Fill,
    Line,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorTileLayer {
    /// TileJSON endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Tile URL templates, used instead of `url` when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<String>>,
    /// Layer inside the tiles to draw. Discovered from TileJSON when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(default)]
    pub render: VectorRender,
    #[serde(flatten)]
    pub common: LayerCommon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayer {
    pub tiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(flatten)]
    pub common: LayerCommon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoParquetLayer {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_column: Option<String>,
    #[serde(flatten)]
    pub common: LayerCommon,
}

/// Geometry treatment for archive-packaged tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveRender {
    #[default]
    Fill,
    Line,
    Circle,
    Raster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmTilesLayer {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(default)]
    pub render: ArchiveRender,
    #[serde(flatten)]
    pub common: LayerCommon,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tag_roundtrip() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(LayerKind::from_tag("contour"), None);
    }

    #[test]
    fn test_parse_tagged_layer() {
        let def: LayerDefinition = serde_json::from_value(json!({
            "type": "route",
            "waypoints": [[0, 0], [1, 1]],
            "profile": "walking",
            "tooltip": ["name"],
            "style": {"color": "#f00", "line_width": 3}
        }))
        .unwrap();
        assert_eq!(def.kind(), LayerKind::Route);
        let LayerDefinition::Route(route) = &def else {
            panic!("expected route");
        };
        assert!(!route.is_manual());
        assert_eq!(route.profile, RouteProfile::Walking);
        assert!(def.common().visible);
        assert!(def.common().is_interactive());
        assert_eq!(def.style().line_width, Some(3.0));
    }

    #[test]
    fn test_color_spec_variants() {
        let lit: ColorSpec = serde_json::from_value(json!("#123456")).unwrap();
        assert!(!lit.is_data_driven());
        let cat: ColorSpec = serde_json::from_value(json!({
            "property": "kind",
            "categories": {"park": "#0f0", "water": "#00f"}
        }))
        .unwrap();
        assert!(matches!(cat, ColorSpec::Categorical { .. }));
        let grad: ColorSpec = serde_json::from_value(json!({
            "property": "pop",
            "stops": [[0, "#fff"], [100, "#000"]]
        }))
        .unwrap();
        assert!(matches!(grad, ColorSpec::Graduated { ref stops, .. } if stops.len() == 2));
    }

    #[test]
    fn test_tooltip_render() {
        let props = json!({"name": "Main St", "lanes": 2}).as_object().cloned().unwrap();
        let fields = Tooltip::Fields(vec!["name".into(), "missing".into(), "lanes".into()]);
        assert_eq!(fields.render(&props), "name: Main St\nlanes: 2");
        let tpl = Tooltip::Template("{name} ({lanes} lanes) {".into());
        assert_eq!(tpl.render(&props), "Main St (2 lanes) {");
    }

    #[test]
    fn test_feature_properties() {
        let data = GeoJsonData::Inline(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"a": 1}, "geometry": null},
                {"type": "Feature", "geometry": null}
            ]
        }));
        let rows = data.feature_properties();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["a"], json!(1));
        assert!(rows[1].is_empty());
        assert!(GeoJsonData::Url("x.geojson".into()).feature_properties().is_empty());
    }
}
