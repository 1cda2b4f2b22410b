/**
 * Optimistic Message Timeline
 *
 * The client-side reconciliation structure: an ordered list of message
 * identifiers plus a lookup table keyed by identifier.
 *
 * # Identifier Swap
 *
 * A locally sent message is inserted immediately under a temporary id and
 * marked pending. When the server ack arrives with the real id, the entry
 * is replaced atomically: the temporary key leaves the table, the real key
 * enters it, and the ordered list is rewritten in place at the same
 * position. There is no window in which both or neither key resolves, so
 * no duplicate or reordering is ever visible. A failed send removes the
 * provisional entry without touching its neighbors, and a replayed copy of
 * an already-known message is ignored by identifier.
 */
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: String,
    pub content: String,
    /// True while the entry awaits server confirmation.
    pub pending: bool,
}

/// Ordered message timeline with a two-key reconciliation index.
#[derive(Debug, Default)]
pub struct Timeline {
    order: Vec<String>,
    entries: HashMap<String, TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a provisional entry for an optimistic send. Returns `false`
    /// (and changes nothing) if the id is already present.
    pub fn add_local(&mut self, temp_id: &str, content: &str) -> bool {
        if self.entries.contains_key(temp_id) {
            return false;
        }
        self.order.push(temp_id.to_string());
        self.entries.insert(
            temp_id.to_string(),
            TimelineEntry {
                id: temp_id.to_string(),
                content: content.to_string(),
                pending: true,
            },
        );
        true
    }

    /// Swap a provisional entry for its confirmed identity, in place.
    /// Returns `false` when the temporary id is unknown or the real id is
    /// already present (reconnect replay beat the ack).
    pub fn confirm(&mut self, temp_id: &str, real_id: &str) -> bool {
        if !self.entries.contains_key(temp_id) || self.entries.contains_key(real_id) {
            return false;
        }
        let Some(position) = self.order.iter().position(|id| id == temp_id) else {
            return false;
        };

        // Both mutations happen here, back to back, with no early return in
        // between: the table never holds both keys or neither.
        let mut entry = match self.entries.remove(temp_id) {
            Some(entry) => entry,
            None => return false,
        };
        entry.id = real_id.to_string();
        entry.pending = false;
        self.entries.insert(real_id.to_string(), entry);
        self.order[position] = real_id.to_string();
        true
    }

    /// Drop a provisional entry after a failed send. Neighboring entries
    /// keep their relative order.
    pub fn fail(&mut self, temp_id: &str) -> bool {
        if self.entries.remove(temp_id).is_none() {
            return false;
        }
        self.order.retain(|id| id != temp_id);
        true
    }

    /// Append a message received over the real-time channel. A duplicate of
    /// an already-known identifier is ignored, never appended twice.
    pub fn apply_remote(&mut self, id: &str, content: &str) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.order.push(id.to_string());
        self.entries.insert(
            id.to_string(),
            TimelineEntry {
                id: id.to_string(),
                content: content.to_string(),
                pending: false,
            },
        );
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, id: &str) -> Option<&TimelineEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
