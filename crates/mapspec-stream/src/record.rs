//! Classification of patch stream lines.
//!
//! Each line is one of:
//! - blank or a `//` comment: ignored
//! - a fenced-block delimiter (```` ``` ````, ```` ```json ````): ignored
//! - a metadata record (`{"meta": "usage", ...}` / `{"meta": "error", ...}`): side channel
//! - a patch record (`{"op": ..., "path": ..., "value": ...}`): applied
//! - anything else: narrative text, never applied

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mapspec_core::PatchOperation;

/// Token accounting reported by the token source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A side-channel record that is reported, never applied.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaRecord {
    Usage(Usage),
    Error { message: String },
}

/// One classified line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    Blank,
    Comment,
    Fence,
    Meta(MetaRecord),
    Patch(PatchOperation),
    Narrative(String),
}

impl StreamLine {
    pub fn is_ignored(&self) -> bool {
        matches!(self, StreamLine::Blank | StreamLine::Comment | StreamLine::Fence)
    }
}

/// Classify one line of the patch stream.
pub fn classify(line: &str) -> StreamLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StreamLine::Blank;
    }
    if trimmed.starts_with("//") {
        return StreamLine::Comment;
    }
    if trimmed.starts_with("```") {
        return StreamLine::Fence;
    }
    if !trimmed.starts_with('{') {
        return StreamLine::Narrative(trimmed.to_string());
    }

    // Unparsable structured records fall through to narrative text.
    let Ok(Value::Object(record)) = serde_json::from_str::<Value>(trimmed) else {
        return StreamLine::Narrative(trimmed.to_string());
    };

    if let Some(meta) = meta_kind(&record) {
        match meta {
            "usage" => {
                let count = |k: &str| record.get(k).and_then(Value::as_u64).unwrap_or(0);
                return StreamLine::Meta(MetaRecord::Usage(Usage {
                    input_tokens: count("input_tokens"),
                    output_tokens: count("output_tokens"),
                }));
            }
            "error" => {
                let message = record
                    .get("message")
                    .or_else(|| record.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return StreamLine::Meta(MetaRecord::Error { message });
            }
            _ => {}
        }
    }

    if record.contains_key("op") && record.contains_key("path") {
        if let Ok(patch) = serde_json::from_value::<PatchOperation>(Value::Object(record)) {
            return StreamLine::Patch(patch);
        }
    }
    StreamLine::Narrative(trimmed.to_string())
}

fn meta_kind(record: &serde_json::Map<String, Value>) -> Option<&str> {
    record
        .get("meta")
        .or_else(|| record.get("type"))
        .and_then(Value::as_str)
        .filter(|k| matches!(*k, "usage" | "error"))
}

/// Splits arriving text chunks into complete lines.
///
/// A line may span any number of chunks; the trailing unterminated
/// fragment is held until more text or [`LineSplitter::finish`].
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let mut line: String = self.pending.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// The unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
