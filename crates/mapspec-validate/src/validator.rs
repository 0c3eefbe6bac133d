use serde_json::{Map, Value};

use mapspec_core::LayerKind;

use crate::autofix::{self, escape, FixNote};
use crate::issue::{IssueKind, ValidationIssue};
use crate::schema::{self, Field, FieldType, TOP_LEVEL_FIELDS};

/// The validation contract the patch stream builder relies on.
pub trait SchemaValidator {
    /// Strip unknown fields and coerce coercible values in place.
    fn auto_fix(&self, doc: &mut Value) -> Vec<FixNote>;
    /// Report everything that is still structurally wrong.
    fn validate(&self, doc: &Value) -> Vec<ValidationIssue>;
}

/// Outcome of auto-fix followed by validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub fixes: Vec<FixNote>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(ValidationIssue::is_error)
    }
}

/// Validator for the map specification document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecValidator;

impl SpecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Auto-fix then validate.
    pub fn check(&self, doc: &mut Value) -> ValidationReport {
        let fixes = self.auto_fix(doc);
        let issues = self.validate(doc);
        ValidationReport { fixes, issues }
    }
}

impl SchemaValidator for SpecValidator {
    fn auto_fix(&self, doc: &mut Value) -> Vec<FixNote> {
        autofix::auto_fix(doc)
    }

    fn validate(&self, doc: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let Some(root) = doc.as_object() else {
            issues.push(ValidationIssue::error("", IssueKind::WrongType, "document must be an object"));
            return issues;
        };

        check_fields(root, TOP_LEVEL_FIELDS.iter(), "", &mut issues);

        for map_field in ["markers", "legends", "widgets"] {
            let Some(fields) = schema::entry_fields(map_field) else {
                continue;
            };
            for_each_entry(root, map_field, &mut issues, |id, obj, issues| {
                check_fields(obj, fields.iter(), &format!("/{}/{}", map_field, escape(id)), issues);
            });
        }

        for_each_entry(root, "layers", &mut issues, |id, obj, issues| {
            check_layer(obj, &format!("/layers/{}", escape(id)), issues);
        });

        check_references(root, &mut issues);
        issues
    }
}

fn for_each_entry<F>(root: &Map<String, Value>, field: &str, issues: &mut Vec<ValidationIssue>, mut f: F)
where
    F: FnMut(&str, &Map<String, Value>, &mut Vec<ValidationIssue>),
{
    let Some(value) = root.get(field) else {
        return;
    };
    let Some(entries) = value.as_object() else {
        issues.push(ValidationIssue::error(
            format!("/{}", field),
            IssueKind::WrongType,
            "expected an object keyed by id",
        ));
        return;
    };
    for (id, entry) in entries {
        match entry.as_object() {
            Some(obj) => f(id, obj, issues),
            None => issues.push(ValidationIssue::error(
                format!("/{}/{}", field, escape(id)),
                IssueKind::WrongType,
                "expected an object",
            )),
        }
    }
}

fn check_layer(obj: &Map<String, Value>, path: &str, issues: &mut Vec<ValidationIssue>) {
    let type_path = format!("{}/type", path);
    let tag = match obj.get("type") {
        None => {
            issues.push(ValidationIssue::error(type_path, IssueKind::MissingField, "missing required field"));
            return;
        }
        Some(Value::String(tag)) => tag,
        Some(_) => {
            issues.push(ValidationIssue::error(type_path, IssueKind::WrongType, "expected a string"));
            return;
        }
    };
    let Some(kind) = LayerKind::from_tag(tag) else {
        let message = match schema::resolve_layer_kind(tag) {
            Some(k) => format!("unknown layer type '{}' (did you mean '{}'?)", tag, k.tag()),
            None => format!("unknown layer type '{}'", tag),
        };
        issues.push(ValidationIssue::error(type_path, IssueKind::UnknownLayerType, message));
        return;
    };

    check_fields(obj, schema::layer_fields(kind), path, issues);

    match kind {
        LayerKind::Route => {
            // Explicit coordinates take precedence over waypoints when drawn.
            if let Some(coordinates) = obj.get("coordinates").and_then(Value::as_array) {
                if coordinates.len() < 2 {
                    issues.push(ValidationIssue::error(
                        format!("{}/coordinates", path),
                        IssueKind::InvalidValue,
                        "route coordinates need at least two points",
                    ));
                }
            } else if !obj
                .get("waypoints")
                .and_then(Value::as_array)
                .is_some_and(|a| a.len() >= 2)
            {
                issues.push(ValidationIssue::error(
                    format!("{}/waypoints", path),
                    IssueKind::MissingField,
                    "route needs at least two waypoints or explicit coordinates",
                ));
            }
        }
        LayerKind::VectorTile => {
            if !obj.contains_key("url") && !obj.contains_key("tiles") {
                issues.push(ValidationIssue::error(
                    format!("{}/url", path),
                    IssueKind::MissingField,
                    "one of url or tiles is required",
                ));
            }
        }
        _ => {}
    }
}

fn check_references(root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let layers = root.get("layers").and_then(Value::as_object);
    let known = |id: &str| layers.is_some_and(|l| l.contains_key(id));
    for map_field in ["legends", "widgets"] {
        let Some(entries) = root.get(map_field).and_then(Value::as_object) else {
            continue;
        };
        for (id, entry) in entries {
            if let Some(layer) = entry.get("layer").and_then(Value::as_str) {
                if !known(layer) {
                    issues.push(ValidationIssue::warning(
                        format!("/{}/{}/layer", map_field, escape(id)),
                        IssueKind::DanglingReference,
                        format!("references unknown layer '{}'", layer),
                    ));
                }
            }
        }
    }
}

fn check_fields<'a, I>(obj: &Map<String, Value>, fields: I, path: &str, issues: &mut Vec<ValidationIssue>)
where
    I: Iterator<Item = &'a Field>,
{
    for field in fields {
        let field_path = format!("{}/{}", path, field.name);
        match obj.get(field.name) {
            Some(value) => check_value(value, field.ty, &field_path, issues),
            None if field.required => issues.push(ValidationIssue::error(
                field_path,
                IssueKind::MissingField,
                "missing required field",
            )),
            None => {}
        }
    }
}

fn check_value(value: &Value, ty: FieldType, path: &str, issues: &mut Vec<ValidationIssue>) {
    let wrong = |expected: &str| ValidationIssue::error(path, IssueKind::WrongType, format!("expected {}", expected));
    match ty {
        FieldType::String => {
            if !value.is_string() {
                issues.push(wrong("a string"));
            }
        }
        FieldType::Number { min, max } => match value.as_f64() {
            None => issues.push(wrong("a number")),
            Some(n) if n < min || n > max => issues.push(ValidationIssue::error(
                path,
                IssueKind::OutOfRange,
                format!("{} is outside {}..={}", n, min, max),
            )),
            Some(_) => {}
        },
        FieldType::Integer => {
            if value.as_u64().is_none() {
                issues.push(wrong("a non-negative integer"));
            }
        }
        FieldType::Bool => {
            if !value.is_boolean() {
                issues.push(wrong("a boolean"));
            }
        }
        FieldType::LngLat => check_lnglat(value, path, issues),
        FieldType::Bounds => {
            let ok = value
                .as_array()
                .is_some_and(|a| a.len() == 4 && a.iter().all(Value::is_number));
            if !ok {
                issues.push(wrong("[west, south, east, north]"));
            }
        }
        FieldType::StringList => match value.as_array() {
            Some(a) if a.is_empty() => issues.push(ValidationIssue::error(
                path,
                IssueKind::InvalidValue,
                "must not be empty",
            )),
            Some(a) if a.iter().all(Value::is_string) => {}
            _ => issues.push(wrong("a list of strings")),
        },
        FieldType::LngLatList => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_lnglat(item, &format!("{}/{}", path, i), issues);
                }
            }
            None => issues.push(wrong("a list of [lng, lat] pairs")),
        },
        FieldType::OneOf(options) => match value.as_str() {
            Some(s) if options.contains(&s) => {}
            _ => issues.push(ValidationIssue::error(
                path,
                IssueKind::InvalidValue,
                format!("expected one of {}", options.join(", ")),
            )),
        },
        FieldType::Color => check_color(value, path, issues),
        FieldType::Tooltip => {
            let ok = value.is_string()
                || value
                    .as_array()
                    .is_some_and(|a| a.iter().all(Value::is_string));
            if !ok {
                issues.push(wrong("a template string or a list of property names"));
            }
        }
        FieldType::Popup => {
            if !value.is_string() && !value.is_object() {
                issues.push(wrong("a string or a popup object"));
            }
        }
        FieldType::GeoJson => match value {
            Value::String(_) => {}
            Value::Object(obj) if obj.get("type").is_some_and(Value::is_string) => {}
            _ => issues.push(wrong("a URL or an inline GeoJSON object")),
        },
        FieldType::Object(fields) => match value.as_object() {
            Some(obj) => check_fields(obj, fields.iter(), path, issues),
            None => issues.push(wrong("an object")),
        },
        FieldType::Toggle(fields) => match value {
            Value::Bool(_) => {}
            Value::Object(obj) => check_fields(obj, fields.iter(), path, issues),
            _ => issues.push(wrong("a boolean or an object")),
        },
    }
}

fn check_lnglat(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let pair = value
        .as_array()
        .filter(|a| a.len() == 2)
        .and_then(|a| Some((a[0].as_f64()?, a[1].as_f64()?)));
    match pair {
        None => issues.push(ValidationIssue::error(
            path,
            IssueKind::WrongType,
            "expected [lng, lat]",
        )),
        Some((_, lat)) if !(-90.0..=90.0).contains(&lat) => issues.push(ValidationIssue::error(
            path,
            IssueKind::OutOfRange,
            format!("latitude {} is outside -90..=90", lat),
        )),
        Some(_) => {}
    }
}

fn check_color(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let obj = match value {
        Value::String(_) => return,
        Value::Object(obj) => obj,
        _ => {
            issues.push(ValidationIssue::error(
                path,
                IssueKind::WrongType,
                "expected a color string or a data-driven color object",
            ));
            return;
        }
    };
    if !obj.get("property").is_some_and(Value::is_string) {
        issues.push(ValidationIssue::error(
            format!("{}/property", path),
            IssueKind::MissingField,
            "missing required field",
        ));
    }
    let categories_ok = obj
        .get("categories")
        .and_then(Value::as_object)
        .is_some_and(|c| c.values().all(Value::is_string));
    let stops_ok = obj.get("stops").and_then(Value::as_array).is_some_and(|s| {
        !s.is_empty()
            && s.iter().all(|stop| {
                stop.as_array()
                    .is_some_and(|p| p.len() == 2 && p[0].is_number() && p[1].is_string())
            })
    });
    if !categories_ok && !stops_ok {
        issues.push(ValidationIssue::error(
            path,
            IssueKind::InvalidValue,
            "data-driven color needs string categories or [value, color] stops",
        ));
    }
}
