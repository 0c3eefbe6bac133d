use std::collections::HashMap;

use crate::engine::{ListenerId, PointerEventKind};

/// One listener created while building a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub event: PointerEventKind,
    pub sub_layer: String,
    pub listener: ListenerId,
}

/// Every listener created for each layer id, so removal by id alone
/// can unregister all of them.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    entries: HashMap<String, Vec<Registration>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, event: PointerEventKind, sub_layer: &str, listener: ListenerId) {
        self.entries.entry(id.to_string()).or_default().push(Registration {
            event,
            sub_layer: sub_layer.to_string(),
            listener,
        });
    }

    /// Remove and return every registration for `id`.
    pub fn take(&mut self, id: &str) -> Vec<Registration> {
        self.entries.remove(id).unwrap_or_default()
    }

    /// Remove and return everything.
    pub fn drain(&mut self) -> Vec<Registration> {
        self.entries.drain().flat_map(|(_, regs)| regs).collect()
    }

    pub fn registrations(&self, id: &str) -> &[Registration] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
