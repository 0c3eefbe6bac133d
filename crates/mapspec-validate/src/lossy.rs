use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use mapspec_core::Specification;

use crate::autofix::escape;
use crate::issue::{IssueKind, ValidationIssue};

/// Convert a document to a typed [`Specification`], field by field and
/// entry by entry. Anything that does not parse is left out and reported;
/// everything else is kept.
pub fn to_specification_lossy(doc: &Value) -> (Specification, Vec<ValidationIssue>) {
    let mut issues = Vec::new();
    let mut spec = Specification::default();
    let Some(root) = doc.as_object() else {
        issues.push(ValidationIssue::error("", IssueKind::WrongType, "document must be an object"));
        return (spec, issues);
    };

    spec.basemap = field(root, "basemap", &mut issues);
    spec.center = field(root, "center", &mut issues);
    spec.zoom = field(root, "zoom", &mut issues);
    spec.pitch = field(root, "pitch", &mut issues);
    spec.bearing = field(root, "bearing", &mut issues);
    spec.bounds = field(root, "bounds", &mut issues);
    spec.projection = field(root, "projection", &mut issues);
    spec.controls = field(root, "controls", &mut issues);
    spec.markers = entries(root, "markers", &mut issues);
    spec.layers = entries(root, "layers", &mut issues);
    spec.legends = entries(root, "legends", &mut issues);
    spec.widgets = entries(root, "widgets", &mut issues);

    if !issues.is_empty() {
        log::debug!("Best-effort conversion dropped {} item(s)", issues.len());
    }
    (spec, issues)
}

fn field<T: DeserializeOwned>(root: &Map<String, Value>, name: &str, issues: &mut Vec<ValidationIssue>) -> Option<T> {
    let value = root.get(name).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            issues.push(ValidationIssue::error(format!("/{}", name), IssueKind::InvalidValue, e.to_string()));
            None
        }
    }
}

fn entries<T: DeserializeOwned>(
    root: &Map<String, Value>,
    name: &str,
    issues: &mut Vec<ValidationIssue>,
) -> IndexMap<String, T> {
    let mut out = IndexMap::new();
    let Some(value) = root.get(name).filter(|v| !v.is_null()) else {
        return out;
    };
    let Some(map) = value.as_object() else {
        issues.push(ValidationIssue::error(
            format!("/{}", name),
            IssueKind::WrongType,
            "expected an object keyed by id",
        ));
        return out;
    };
    for (id, entry) in map {
        match T::deserialize(entry) {
            Ok(parsed) => {
                out.insert(id.clone(), parsed);
            }
            Err(e) => issues.push(ValidationIssue::error(
                format!("/{}/{}", name, escape(id)),
                IssueKind::InvalidValue,
                e.to_string(),
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_broken_layer_dropped_rest_kept() {
        let doc = json!({
            "basemap": "dark",
            "zoom": "far",
            "markers": {"home": {"coordinates": [1, 2]}},
            "layers": {
                "ok": {"type": "geojson", "data": "a.geojson"},
                "sat": {"type": "raster"},
                "trip": {"type": "route", "coordinates": [[0, 0], [1, 1]]}
            }
        });
        let (spec, issues) = to_specification_lossy(&doc);
        assert_eq!(spec.basemap.as_deref(), Some("dark"));
        assert_eq!(spec.zoom, None);
        assert_eq!(spec.marker_count(), 1);
        let ids: Vec<&str> = spec.layers.keys().map(String::as_str).collect();
        assert_eq!(ids, ["ok", "trip"]);
        let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["/zoom", "/layers/sat"]);
    }

    #[test]
    fn test_valid_document_fully_kept() {
        let doc = json!({
            "projection": "globe",
            "bounds": [0, 0, 10, 10],
            "layers": {"h": {"type": "heatmap", "data": {"type": "FeatureCollection", "features": []}, "weight": "mag"}},
            "legends": {"l": {"layer": "h", "position": "bottom-right"}},
            "widgets": {"w": {"title": "Quakes", "layer": "h", "stat": "max", "column": "mag"}}
        });
        let (spec, issues) = to_specification_lossy(&doc);
        assert!(issues.is_empty(), "{:?}", issues);
        assert_eq!(spec.layer_count(), 1);
        assert_eq!(spec.legends.len(), 1);
        assert_eq!(spec.widgets.len(), 1);
        assert!(spec.bounds.is_some());
    }
}
