//! Engine paint/layout properties and filters derived from a layer's style block.

use serde_json::{json, Map, Value};

use mapspec_core::{ColorSpec, LayerStyle, RenderSettings};

/// A style block with every default filled in from the settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub color: Value,
    pub stroke_color: Value,
    pub line_width: f64,
    pub point_radius: f64,
    pub opacity: f64,
}

impl ResolvedStyle {
    pub fn resolve(style: &LayerStyle, settings: &RenderSettings) -> Self {
        let color = style
            .color
            .as_ref()
            .map(|c| color_expression(c, &settings.default_color))
            .unwrap_or_else(|| Value::String(settings.default_color.clone()));
        let stroke_color = style
            .stroke_color
            .as_ref()
            .map(|c| color_expression(c, &settings.default_stroke_color))
            .unwrap_or_else(|| Value::String(settings.default_stroke_color.clone()));
        Self {
            color,
            stroke_color,
            line_width: style.line_width.unwrap_or(settings.default_line_width),
            point_radius: style.point_radius.unwrap_or(settings.default_point_radius),
            opacity: style.opacity.unwrap_or(settings.default_opacity).clamp(0.0, 1.0),
        }
    }
}

/// A literal color, or a `match` / `interpolate` expression over a feature property.
pub fn color_expression(color: &ColorSpec, fallback: &str) -> Value {
    match color {
        ColorSpec::Literal(c) => Value::String(c.clone()),
        ColorSpec::Categorical {
            property,
            categories,
            fallback: own_fallback,
        } => {
            let fallback = own_fallback.as_deref().unwrap_or(fallback);
            if categories.is_empty() {
                return Value::String(fallback.to_string());
            }
            let mut expr = vec![json!("match"), json!(["get", property])];
            for (value, color) in categories {
                expr.push(json!(value));
                expr.push(json!(color));
            }
            expr.push(json!(fallback));
            Value::Array(expr)
        }
        ColorSpec::Graduated { property, stops } => {
            let mut stops = stops.clone();
            stops.sort_by(|a, b| a.0.total_cmp(&b.0));
            stops.dedup_by(|a, b| a.0 == b.0);
            match stops.as_slice() {
                [] => Value::String(fallback.to_string()),
                [(_, only)] => Value::String(only.clone()),
                _ => {
                    let mut expr = vec![
                        json!("interpolate"),
                        json!(["linear"]),
                        json!(["to-number", ["get", property]]),
                    ];
                    for (value, color) in stops {
                        expr.push(json!(value));
                        expr.push(json!(color));
                    }
                    Value::Array(expr)
                }
            }
        }
    }
}

fn props(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub fn polygon_filter() -> Value {
    json!(["match", ["geometry-type"], ["Polygon", "MultiPolygon"], true, false])
}

/// Lines, plus polygon outlines.
pub fn line_filter() -> Value {
    json!([
        "match",
        ["geometry-type"],
        ["LineString", "MultiLineString", "Polygon", "MultiPolygon"],
        true,
        false
    ])
}

pub fn point_filter(clustered: bool) -> Value {
    let points = json!(["match", ["geometry-type"], ["Point", "MultiPoint"], true, false]);
    if clustered {
        json!(["all", points, ["!", ["has", "point_count"]]])
    } else {
        points
    }
}

pub fn cluster_filter() -> Value {
    json!(["has", "point_count"])
}

pub fn fill_paint(style: &ResolvedStyle) -> Map<String, Value> {
    props(vec![
        ("fill-color", style.color.clone()),
        ("fill-opacity", json!(style.opacity)),
        ("fill-outline-color", style.stroke_color.clone()),
    ])
}

/// Line paint. With `outline_polygons`, polygon outlines take the stroke color.
pub fn line_paint(style: &ResolvedStyle, outline_polygons: bool) -> Map<String, Value> {
    let color = if outline_polygons {
        json!(["case", polygon_filter(), style.stroke_color, style.color])
    } else {
        style.color.clone()
    };
    props(vec![
        ("line-color", color),
        ("line-width", json!(style.line_width)),
        ("line-opacity", json!(style.opacity)),
    ])
}

pub fn line_layout() -> Map<String, Value> {
    props(vec![("line-join", json!("round")), ("line-cap", json!("round"))])
}

pub fn circle_paint(style: &ResolvedStyle) -> Map<String, Value> {
    props(vec![
        ("circle-color", style.color.clone()),
        ("circle-radius", json!(style.point_radius)),
        ("circle-opacity", json!(style.opacity)),
        ("circle-stroke-color", style.stroke_color.clone()),
        ("circle-stroke-width", json!(1)),
    ])
}

/// Cluster badges grow with the number of points they hold.
pub fn cluster_paint(style: &ResolvedStyle) -> Map<String, Value> {
    let r = style.point_radius.max(1.0);
    props(vec![
        ("circle-color", style.color.clone()),
        (
            "circle-radius",
            json!(["step", ["get", "point_count"], r * 2.5, 10, r * 3.5, 100, r * 5.0]),
        ),
        ("circle-opacity", json!(style.opacity)),
        ("circle-stroke-color", json!("#ffffff")),
        ("circle-stroke-width", json!(2)),
    ])
}

pub fn cluster_label_layout() -> Map<String, Value> {
    props(vec![
        ("text-field", json!(["get", "point_count_abbreviated"])),
        ("text-size", json!(12)),
        ("text-allow-overlap", json!(true)),
    ])
}

pub fn cluster_label_paint() -> Map<String, Value> {
    props(vec![("text-color", json!("#ffffff"))])
}

pub fn heatmap_paint(weight: Option<&str>, radius: f64, intensity: f64, opacity: f64) -> Map<String, Value> {
    let weight = match weight {
        Some(property) => json!(["to-number", ["get", property], 1]),
        None => json!(1),
    };
    props(vec![
        ("heatmap-weight", weight),
        ("heatmap-radius", json!(radius)),
        ("heatmap-intensity", json!(intensity)),
        ("heatmap-opacity", json!(opacity)),
    ])
}

pub fn raster_paint(opacity: f64) -> Map<String, Value> {
    props(vec![("raster-opacity", json!(opacity))])
}
