//! Field tables describing every object the document model accepts.

use mapspec_core::LayerKind;

/// Expected shape of one field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String,
    Number { min: f64, max: f64 },
    Integer,
    Bool,
    /// `[lng, lat]`
    LngLat,
    /// `[west, south, east, north]`
    Bounds,
    StringList,
    LngLatList,
    /// One of a fixed set of lowercase tokens.
    OneOf(&'static [&'static str]),
    /// A literal color string or a data-driven color object.
    Color,
    /// A list of property names or a template string.
    Tooltip,
    /// Text or a `{title, description, image}` object.
    Popup,
    /// A URL string or an inline GeoJSON object.
    GeoJson,
    /// A nested object with its own field table.
    Object(&'static [Field]),
    /// A nested object that may also be given as `true`/`false`.
    Toggle(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

const fn opt(name: &'static str, ty: FieldType) -> Field {
    Field {
        name,
        ty,
        required: false,
    }
}

const fn req(name: &'static str, ty: FieldType) -> Field {
    Field {
        name,
        ty,
        required: true,
    }
}

const ANY_NUMBER: FieldType = FieldType::Number {
    min: f64::MIN,
    max: f64::MAX,
};

const NON_NEGATIVE: FieldType = FieldType::Number {
    min: 0.0,
    max: f64::MAX,
};

pub const CORNERS: &[&str] = &["top-left", "top-right", "bottom-left", "bottom-right"];

pub const STYLE_FIELDS: &[Field] = &[
    opt("color", FieldType::Color),
    opt("stroke_color", FieldType::Color),
    opt("line_width", NON_NEGATIVE),
    opt("point_radius", NON_NEGATIVE),
    opt("opacity", FieldType::Number { min: 0.0, max: 1.0 }),
];

/// Keys of a data-driven color object.
pub const COLOR_FIELDS: &[&str] = &["property", "categories", "fallback", "stops"];

const CLUSTER_FIELDS: &[Field] = &[opt("radius", NON_NEGATIVE), opt("max_zoom", NON_NEGATIVE)];

pub const TOP_LEVEL_FIELDS: &[Field] = &[
    opt("basemap", FieldType::String),
    opt("center", FieldType::LngLat),
    opt("zoom", FieldType::Number { min: 0.0, max: 24.0 }),
    opt("pitch", FieldType::Number { min: 0.0, max: 85.0 }),
    opt("bearing", ANY_NUMBER),
    opt("bounds", FieldType::Bounds),
    opt("projection", FieldType::OneOf(&["mercator", "globe"])),
    opt("controls", FieldType::Object(CONTROL_FIELDS)),
];

pub const MARKER_FIELDS: &[Field] = &[
    req("coordinates", FieldType::LngLat),
    opt("color", FieldType::String),
    opt("icon", FieldType::String),
    opt("label", FieldType::String),
    opt("tooltip", FieldType::String),
    opt("popup", FieldType::Popup),
    opt("draggable", FieldType::Bool),
];

pub const LEGEND_FIELDS: &[Field] = &[
    req("layer", FieldType::String),
    opt("title", FieldType::String),
    opt("position", FieldType::OneOf(CORNERS)),
];

pub const CONTROL_FIELDS: &[Field] = &[
    opt("zoom", FieldType::Bool),
    opt("compass", FieldType::Bool),
    opt("fullscreen", FieldType::Bool),
    opt("locate", FieldType::Bool),
    opt("basemap_switcher", FieldType::Bool),
    opt("search", FieldType::Bool),
    opt("layer_switcher", FieldType::Bool),
    opt("position", FieldType::OneOf(CORNERS)),
];

pub const WIDGET_FIELDS: &[Field] = &[
    req("title", FieldType::String),
    opt("layer", FieldType::String),
    opt("column", FieldType::String),
    opt("stat", FieldType::OneOf(&["count", "sum", "mean", "min", "max"])),
    opt("value", FieldType::String),
    opt("position", FieldType::OneOf(CORNERS)),
];

pub const LAYER_COMMON_FIELDS: &[Field] = &[
    req("type", FieldType::String),
    opt("style", FieldType::Object(STYLE_FIELDS)),
    opt("tooltip", FieldType::Tooltip),
    opt("clickable", FieldType::Bool),
    opt("visible", FieldType::Bool),
    opt("label", FieldType::String),
];

const GEOJSON_FIELDS: &[Field] = &[
    req("data", FieldType::GeoJson),
    opt("cluster", FieldType::Toggle(CLUSTER_FIELDS)),
];

const ROUTE_FIELDS: &[Field] = &[
    opt("waypoints", FieldType::LngLatList),
    opt("coordinates", FieldType::LngLatList),
    opt("profile", FieldType::OneOf(&["driving", "walking", "cycling"])),
];

const HEATMAP_FIELDS: &[Field] = &[
    req("data", FieldType::GeoJson),
    opt("weight", FieldType::String),
    opt("radius", NON_NEGATIVE),
    opt("intensity", NON_NEGATIVE),
];

const VECTOR_TILE_FIELDS: &[Field] = &[
    opt("url", FieldType::String),
    opt("tiles", FieldType::StringList),
    opt("source_layer", FieldType::String),
    opt("render", FieldType::OneOf(&["fill", "line", "circle"])),
];

const RASTER_FIELDS: &[Field] = &[
    req("tiles", FieldType::StringList),
    opt("tile_size", FieldType::Integer),
    opt("attribution", FieldType::String),
];

const GEOPARQUET_FIELDS: &[Field] = &[
    req("url", FieldType::String),
    opt("geometry_column", FieldType::String),
];

const PMTILES_FIELDS: &[Field] = &[
    req("url", FieldType::String),
    opt("source_layer", FieldType::String),
    opt("render", FieldType::OneOf(&["fill", "line", "circle", "raster"])),
];

/// Kind-specific fields for one layer kind.
pub fn kind_fields(kind: LayerKind) -> &'static [Field] {
    match kind {
        LayerKind::Geojson => GEOJSON_FIELDS,
        LayerKind::Route => ROUTE_FIELDS,
        LayerKind::Heatmap => HEATMAP_FIELDS,
        LayerKind::VectorTile => VECTOR_TILE_FIELDS,
        LayerKind::Raster => RASTER_FIELDS,
        LayerKind::Geoparquet => GEOPARQUET_FIELDS,
        LayerKind::Pmtiles => PMTILES_FIELDS,
    }
}

/// All fields accepted by a layer of the given kind.
pub fn layer_fields(kind: LayerKind) -> impl Iterator<Item = &'static Field> + Clone {
    LAYER_COMMON_FIELDS.iter().chain(kind_fields(kind).iter())
}

/// Resolve a layer `type` tag, accepting common spellings.
pub fn resolve_layer_kind(tag: &str) -> Option<LayerKind> {
    let normalized = tag.trim().to_ascii_lowercase().replace(['_', ' '], "-");
    LayerKind::from_tag(&normalized).or(match normalized.as_str() {
        "vectortile" | "vector" | "mvt" => Some(LayerKind::VectorTile),
        "parquet" => Some(LayerKind::Geoparquet),
        "heat" => Some(LayerKind::Heatmap),
        "features" | "geo-json" => Some(LayerKind::Geojson),
        "pm-tiles" => Some(LayerKind::Pmtiles),
        _ => None,
    })
}

/// Top-level fields whose value is an id-keyed map of entries.
pub fn entry_fields(map_field: &str) -> Option<&'static [Field]> {
    match map_field {
        "markers" => Some(MARKER_FIELDS),
        "legends" => Some(LEGEND_FIELDS),
        "widgets" => Some(WIDGET_FIELDS),
        _ => None,
    }
}

/// Whether `name` is a known top-level field.
pub fn is_top_level(name: &str) -> bool {
    name == "layers" || entry_fields(name).is_some() || TOP_LEVEL_FIELDS.iter().any(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_fields() {
        for kind in LayerKind::ALL {
            assert!(layer_fields(kind).any(|f| f.name == "type"));
            assert!(!kind_fields(kind).is_empty());
        }
    }

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(resolve_layer_kind("Vector_Tile"), Some(LayerKind::VectorTile));
        assert_eq!(resolve_layer_kind("parquet"), Some(LayerKind::Geoparquet));
        assert_eq!(resolve_layer_kind("route"), Some(LayerKind::Route));
        assert_eq!(resolve_layer_kind("contour"), None);
    }

    #[test]
    fn test_top_level_names() {
        for name in ["basemap", "markers", "layers", "legends", "widgets", "controls", "bounds"] {
            assert!(is_top_level(name), "{}", name);
        }
        assert!(!is_top_level("title"));
    }
}
