//! Mechanical fixes applied before validation: unknown fields are stripped
//! and values with an obvious intended type are coerced to it.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::schema::{self, Field, FieldType, COLOR_FIELDS, TOP_LEVEL_FIELDS};

/// What the auto-fix did at one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixAction {
    Stripped,
    Coerced { from: Value, to: Value },
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixNote {
    pub path: String,
    #[serde(flatten)]
    pub action: FixAction,
}

/// Strip unknown fields and coerce coercible values in place.
pub fn auto_fix(doc: &mut Value) -> Vec<FixNote> {
    let mut notes = Vec::new();
    let Value::Object(root) = doc else {
        return notes;
    };

    strip_unknown(root, "", schema::is_top_level, &mut notes);
    fix_fields(root, TOP_LEVEL_FIELDS.iter(), "", &mut notes);

    for map_field in ["markers", "legends", "widgets"] {
        let Some(fields) = schema::entry_fields(map_field) else {
            continue;
        };
        if let Some(Value::Object(entries)) = root.get_mut(map_field) {
            for (id, entry) in entries.iter_mut() {
                if let Value::Object(obj) = entry {
                    let path = format!("/{}/{}", map_field, escape(id));
                    fix_object(obj, fields.iter(), &path, &mut notes);
                }
            }
        }
    }

    if let Some(Value::Object(layers)) = root.get_mut("layers") {
        for (id, entry) in layers.iter_mut() {
            if let Value::Object(obj) = entry {
                fix_layer(obj, &format!("/layers/{}", escape(id)), &mut notes);
            }
        }
    }

    if !notes.is_empty() {
        log::debug!("Auto-fix applied {} change(s)", notes.len());
    }
    notes
}

fn fix_layer(obj: &mut Map<String, Value>, path: &str, notes: &mut Vec<FixNote>) {
    let Some(tag) = obj.get("type").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    // Without a known kind there is no field table to strip against.
    let Some(kind) = schema::resolve_layer_kind(&tag) else {
        return;
    };
    if tag != kind.tag() {
        let to = Value::String(kind.tag().to_string());
        notes.push(FixNote {
            path: format!("{}/type", path),
            action: FixAction::Coerced {
                from: Value::String(tag),
                to: to.clone(),
            },
        });
        obj.insert("type".to_string(), to);
    }
    fix_object(obj, schema::layer_fields(kind), path, notes);
}

fn fix_object<'a, I>(obj: &mut Map<String, Value>, fields: I, path: &str, notes: &mut Vec<FixNote>)
where
    I: Iterator<Item = &'a Field> + Clone,
{
    let known = fields.clone();
    strip_unknown(obj, path, |name| known.clone().any(|f| f.name == name), notes);
    fix_fields(obj, fields, path, notes);
}

fn strip_unknown<F>(obj: &mut Map<String, Value>, path: &str, is_known: F, notes: &mut Vec<FixNote>)
where
    F: Fn(&str) -> bool,
{
    let unknown: Vec<String> = obj.keys().filter(|k| !is_known(k)).cloned().collect();
    for key in unknown {
        obj.shift_remove(&key);
        notes.push(FixNote {
            path: format!("{}/{}", path, escape(&key)),
            action: FixAction::Stripped,
        });
    }
}

fn fix_fields<'a, I>(obj: &mut Map<String, Value>, fields: I, path: &str, notes: &mut Vec<FixNote>)
where
    I: Iterator<Item = &'a Field>,
{
    for field in fields {
        let field_path = format!("{}/{}", path, field.name);
        let keep = match obj.get_mut(field.name) {
            Some(value) => fix_value(value, field.ty, &field_path, notes),
            None => continue,
        };
        if !keep {
            obj.shift_remove(field.name);
            notes.push(FixNote {
                path: field_path,
                action: FixAction::Dropped,
            });
        }
    }
}

/// Returns `false` when the field should be removed altogether.
fn fix_value(value: &mut Value, ty: FieldType, path: &str, notes: &mut Vec<FixNote>) -> bool {
    let coerced = match ty {
        FieldType::String => match value {
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldType::Number { .. } => value.as_str().and_then(parse_number),
        FieldType::Integer => match value {
            Value::String(s) => s.trim().parse::<u64>().ok().map(Value::from),
            Value::Number(n) if n.as_u64().is_none() => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| Value::from(f as u64)),
            _ => None,
        },
        FieldType::Bool => match value {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(Value::Bool(true)),
                "false" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            _ => None,
        },
        FieldType::LngLat => coerce_lnglat(value),
        FieldType::Bounds => coerce_number_array(value, 4),
        FieldType::StringList => value.as_str().map(|s| Value::Array(vec![Value::String(s.to_string())])),
        FieldType::LngLatList => {
            if let Value::Array(items) = value {
                for (i, item) in items.iter_mut().enumerate() {
                    if let Some(fixed) = coerce_lnglat(item) {
                        record(notes, &format!("{}/{}", path, i), item, fixed);
                    }
                }
            }
            None
        }
        FieldType::OneOf(options) => value.as_str().and_then(|s| {
            let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
            (normalized != s && options.contains(&normalized.as_str())).then(|| Value::String(normalized))
        }),
        FieldType::Color => {
            if let Value::Object(obj) = value {
                strip_unknown(obj, path, |k| COLOR_FIELDS.contains(&k), notes);
            }
            None
        }
        FieldType::GeoJson => value
            .as_str()
            .filter(|s| s.trim_start().starts_with('{'))
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
            .filter(Value::is_object),
        FieldType::Tooltip | FieldType::Popup => None,
        FieldType::Object(fields) => {
            if let Value::Object(obj) = value {
                fix_object(obj, fields.iter(), path, notes);
            }
            None
        }
        FieldType::Toggle(fields) => match value {
            Value::Bool(false) => return false,
            Value::Bool(true) => Some(Value::Object(Map::new())),
            Value::Object(obj) => {
                fix_object(obj, fields.iter(), path, notes);
                None
            }
            _ => None,
        },
    };
    if let Some(fixed) = coerced {
        record(notes, path, value, fixed);
    }
    true
}

fn record(notes: &mut Vec<FixNote>, path: &str, value: &mut Value, fixed: Value) {
    let from = std::mem::replace(value, fixed);
    notes.push(FixNote {
        path: path.to_string(),
        action: FixAction::Coerced {
            from,
            to: value.clone(),
        },
    });
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn number_of(v: &Value) -> Option<Value> {
    match v {
        Value::Number(_) => Some(v.clone()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Coerce string elements of an all-numeric array of length `len`.
fn coerce_number_array(value: &Value, len: usize) -> Option<Value> {
    let items = value.as_array()?;
    if items.len() != len || items.iter().all(Value::is_number) {
        return None;
    }
    items
        .iter()
        .map(number_of)
        .collect::<Option<Vec<_>>>()
        .map(Value::Array)
}

fn coerce_lnglat(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => coerce_number_array(value, 2),
        Value::String(s) => {
            let parts: Vec<&str> = s.split(',').collect();
            if parts.len() != 2 {
                return None;
            }
            let lng = parse_number(parts[0])?;
            let lat = parse_number(parts[1])?;
            Some(Value::Array(vec![lng, lat]))
        }
        Value::Object(obj) => {
            let lng = obj.get("lng").or_else(|| obj.get("lon")).and_then(number_of)?;
            let lat = obj.get("lat").and_then(number_of)?;
            Some(Value::Array(vec![lng, lat]))
        }
        _ => None,
    }
}

pub(crate) fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_unknown_fields() {
        let mut doc = json!({
            "basemap": "dark",
            "title": "not a field",
            "markers": {"m": {"coordinates": [0, 0], "size": 3}},
            "layers": {"r": {"type": "raster", "tiles": ["t"], "blend": "multiply"}}
        });
        let notes = auto_fix(&mut doc);
        assert_eq!(
            doc,
            json!({
                "basemap": "dark",
                "markers": {"m": {"coordinates": [0, 0]}},
                "layers": {"r": {"type": "raster", "tiles": ["t"]}}
            })
        );
        let stripped: Vec<&str> = notes
            .iter()
            .filter(|n| n.action == FixAction::Stripped)
            .map(|n| n.path.as_str())
            .collect();
        assert_eq!(stripped, ["/title", "/markers/m/size", "/layers/r/blend"]);
    }

    #[test]
    fn test_coerces_values() {
        let mut doc = json!({
            "zoom": "5",
            "center": "10.5, 20",
            "projection": "Globe",
            "markers": {"m": {"coordinates": {"lng": 1, "lat": "2"}, "draggable": "true"}},
            "layers": {
                "g": {"type": "geojson", "data": "{\"type\":\"FeatureCollection\",\"features\":[]}", "cluster": true},
                "r": {"type": "raster", "tiles": "https://t/{z}/{x}/{y}.png", "tile_size": "512"},
                "v": {"type": "Vector_Tile", "tiles": ["t"], "render": "LINE"},
                "p": {"type": "route", "waypoints": [["0", "0"], [1, 1]]}
            }
        });
        auto_fix(&mut doc);
        assert_eq!(doc["zoom"], json!(5));
        assert_eq!(doc["center"], json!([10.5, 20]));
        assert_eq!(doc["projection"], json!("globe"));
        assert_eq!(doc["markers"]["m"]["coordinates"], json!([1, 2]));
        assert_eq!(doc["markers"]["m"]["draggable"], json!(true));
        assert!(doc["layers"]["g"]["data"].is_object());
        assert_eq!(doc["layers"]["g"]["cluster"], json!({}));
        assert_eq!(doc["layers"]["r"]["tiles"], json!(["https://t/{z}/{x}/{y}.png"]));
        assert_eq!(doc["layers"]["r"]["tile_size"], json!(512));
        assert_eq!(doc["layers"]["v"]["type"], json!("vector-tile"));
        assert_eq!(doc["layers"]["v"]["render"], json!("line"));
        assert_eq!(doc["layers"]["p"]["waypoints"], json!([[0, 0], [1, 1]]));
    }

    #[test]
    fn test_toggle_false_drops_field() {
        let mut doc = json!({"layers": {"g": {"type": "geojson", "data": "u.geojson", "cluster": false}}});
        let notes = auto_fix(&mut doc);
        assert!(doc["layers"]["g"].get("cluster").is_none());
        assert!(notes.iter().any(|n| n.action == FixAction::Dropped));
    }

    #[test]
    fn test_unknown_layer_type_left_alone() {
        let mut doc = json!({"layers": {"x": {"type": "contour", "levels": 4}}});
        auto_fix(&mut doc);
        assert_eq!(doc["layers"]["x"]["levels"], json!(4));
    }

    #[test]
    fn test_data_driven_color_stripped() {
        let mut doc = json!({"layers": {"g": {
            "type": "geojson",
            "data": "u",
            "style": {"color": {"property": "k", "categories": {"a": "#f00"}, "legend": true}}
        }}});
        auto_fix(&mut doc);
        assert_eq!(
            doc["layers"]["g"]["style"]["color"],
            json!({"property": "k", "categories": {"a": "#f00"}})
        );
    }
}
