use std::collections::HashMap;

use serde::Serialize;

/// Serialized form of one entity's definition, compared textually to
/// detect "unchanged since last pass".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn of<T: Serialize>(definition: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(definition).map(Signature)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-id signatures recorded by the last reconciliation pass.
#[derive(Debug, Default, Clone)]
pub struct SignatureCache {
    entries: HashMap<String, Signature>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Signature> {
        self.entries.get(id)
    }

    pub fn matches(&self, id: &str, signature: &Signature) -> bool {
        self.entries.get(id) == Some(signature)
    }

    pub fn record(&mut self, id: &str, signature: Signature) {
        self.entries.insert(id.to_string(), signature);
    }

    pub fn forget(&mut self, id: &str) -> Option<Signature> {
        self.entries.remove(id)
    }

    /// Ids recorded last pass that are absent from `current`.
    pub fn stale_ids<'a, I>(&self, current: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let keep: std::collections::HashSet<&String> = current.into_iter().collect();
        let mut stale: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();
        stale.sort();
        stale
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
