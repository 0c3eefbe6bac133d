//! Add/replace/remove patches against the raw specification document.
//!
//! Paths are slash-delimited (`/markers/home/coordinates`), with the JSON
//! pointer escapes `~1` for `/` and `~0` for `~`. Intermediate objects are
//! created on demand for `add`/`replace`; `remove` of something that is not
//! there is a silent no-op.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Invalid patch path '{0}'")]
    InvalidPath(String),

    #[error("Cannot descend into non-container value at '{0}'")]
    NotAContainer(String),

    #[error("Index {index} out of range at '{path}'")]
    IndexOutOfRange { path: String, index: usize },

    #[error("Document root must be an object")]
    RootNotObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// One patch record, as found on the patch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

impl PatchOperation {
    pub fn add(path: &str, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.to_string(),
            value,
        }
    }

    pub fn replace(path: &str, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.to_string(),
            value,
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.to_string(),
            value: Value::Null,
        }
    }
}

/// A parsed patch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPath {
    segments: Vec<String>,
}

impl PatchPath {
    pub fn parse(path: &str) -> Result<Self, PatchError> {
        let Some(rest) = path.strip_prefix('/') else {
            return Err(PatchError::InvalidPath(path.to_string()));
        };
        if rest.is_empty() {
            return Err(PatchError::InvalidPath(path.to_string()));
        }
        let segments = rest
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect();
        Ok(Self { segments })
    }

    /// 1 = top-level field, 2 = entry in a named map, 3+ = nested property.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn top_level(&self) -> &str {
        &self.segments[0]
    }

    fn prefix(&self, len: usize) -> String {
        self.segments[..len]
            .iter()
            .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
            .collect()
    }
}

impl std::fmt::Display for PatchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.prefix(self.segments.len()))
    }
}

/// Apply one patch to a JSON document in place.
pub fn apply_patch(root: &mut Value, patch: &PatchOperation) -> Result<(), PatchError> {
    let path = PatchPath::parse(&patch.path)?;
    if root.is_null() {
        *root = Value::Object(Map::new());
    }
    if !root.is_object() {
        return Err(PatchError::RootNotObject);
    }
    match patch.op {
        PatchOp::Add | PatchOp::Replace => set_at(root, &path, patch.op, patch.value.clone()),
        PatchOp::Remove => {
            remove_at(root, &path);
            Ok(())
        }
    }
}

fn set_at(root: &mut Value, path: &PatchPath, op: PatchOp, value: Value) -> Result<(), PatchError> {
    let (leaf, parents) = path
        .segments
        .split_last()
        .ok_or_else(|| PatchError::InvalidPath(path.to_string()))?;

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index = parse_index(segment)
                    .ok_or_else(|| PatchError::NotAContainer(path.prefix(i + 1)))?;
                items.get_mut(index).ok_or(PatchError::IndexOutOfRange {
                    path: path.prefix(i),
                    index,
                })?
            }
            _ => return Err(PatchError::NotAContainer(path.prefix(i))),
        };
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(leaf.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let at = path.prefix(parents.len());
            let index = if leaf == "-" {
                items.len()
            } else {
                parse_index(leaf).ok_or_else(|| PatchError::InvalidPath(path.to_string()))?
            };
            match op {
                PatchOp::Add if index <= items.len() => {
                    items.insert(index, value);
                    Ok(())
                }
                PatchOp::Replace if index < items.len() => {
                    items[index] = value;
                    Ok(())
                }
                _ => Err(PatchError::IndexOutOfRange { path: at, index }),
            }
        }
        _ => Err(PatchError::NotAContainer(path.prefix(parents.len()))),
    }
}

fn remove_at(root: &mut Value, path: &PatchPath) {
    let Some((leaf, parents)) = path.segments.split_last() else {
        return;
    };
    let mut current = root;
    for segment in parents {
        let next = match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => {
                parse_index(segment).and_then(move |i| items.get_mut(i))
            }
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return,
        }
    }
    match current {
        Value::Object(map) => {
            map.shift_remove(leaf);
        }
        Value::Array(items) => {
            if let Some(i) = parse_index(leaf).filter(|&i| i < items.len()) {
                items.remove(i);
            }
        }
        _ => {}
    }
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    segment.parse().ok()
}

/// The working specification document that patches are applied to.
#[derive(Debug)]
pub struct SpecDocument {
    root: Value,
}

impl SpecDocument {
    /// An empty document, `{}`.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    pub fn from_value(root: Value) -> Result<Self, PatchError> {
        if !root.is_object() {
            return Err(PatchError::RootNotObject);
        }
        Ok(Self { root })
    }

    /// Apply a patch arriving from a stream.
    pub fn apply(&mut self, patch: &PatchOperation) -> Result<(), PatchError> {
        apply_patch(&mut self.root, patch)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// An immutable copy of the current state.
    pub fn snapshot(&self) -> Value {
        self.root.clone()
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

impl Default for SpecDocument {
    fn default() -> Self {
        Self::new()
    }
}
