//! Append-only revision history for one item
//!
//! Only the newest entry keeps its payload. Appending prunes the previous
//! newest entry, so an item never holds more than one full-resolution
//! revision in memory. Entries themselves are never removed or reordered.

use chrono::Utc;
use tracing::debug;

use super::data::{HistoryEntry, PayloadState};
use crate::payload::{Payload, PayloadCodec};

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new entry and prune the payload of the one before it
    pub fn append(&mut self, payload: Payload, label: impl Into<String>) -> &HistoryEntry {
        let byte_size = PayloadCodec::byte_size(&payload);
        let label = label.into();

        if let Some(previous) = self.entries.last_mut() {
            if previous.payload.is_resident() {
                debug!(
                    "Pruning '{}' ({} bytes) from memory",
                    previous.label, previous.byte_size
                );
            }
            previous.payload = PayloadState::Pruned;
        }

        self.entries.push(HistoryEntry {
            payload: PayloadState::Resident(payload),
            byte_size,
            label,
            created_at: Utc::now(),
        });

        let index = self.entries.len() - 1;
        &self.entries[index]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Payload of the newest entry, if it is still resident
    pub fn latest_payload(&self) -> Option<&Payload> {
        self.latest().and_then(|entry| entry.payload.payload())
    }

    /// How many entries currently hold a payload (0 or 1)
    pub fn resident_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.payload.is_resident())
            .count()
    }

    /// Simulates an evicted latest payload; normal operation never does this
    #[cfg(test)]
    pub(crate) fn prune_latest(&mut self) {
        if let Some(last) = self.entries.last_mut() {
            last.payload = PayloadState::Pruned;
        }
    }
}
