use std::collections::HashMap;

/// Identifies one out-of-band resolution for a layer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Layer ids currently awaiting asynchronous resolution.
///
/// Each `begin` issues a fresh ticket. A landing result is only applied
/// when its ticket is still the one on file, so work for an id that was
/// removed or re-added in the meantime discards itself.
#[derive(Debug, Default)]
pub struct PendingSet {
    entries: HashMap<String, Ticket>,
    next: u64,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, id: &str) -> Ticket {
        self.next += 1;
        let ticket = Ticket(self.next);
        self.entries.insert(id.to_string(), ticket);
        ticket
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_current(&self, id: &str, ticket: Ticket) -> bool {
        self.entries.get(id) == Some(&ticket)
    }

    /// Clear `id` if `ticket` is still current. Returns whether it was.
    pub fn finish(&mut self, id: &str, ticket: Ticket) -> bool {
        if self.is_current(id, ticket) {
            self.entries.remove(id);
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
