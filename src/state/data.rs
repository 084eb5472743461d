//! Shared data structures for the engine state
//!
//! These structs represent the data model that flows between the registry,
//! the pipeline and the exporter.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use super::history::History;
use crate::error::Result;
use crate::payload::{Payload, SourceHandle, ThumbnailHandle};

/// Label used for an item's untouched source content
pub const ORIGINAL_LABEL: &str = "Original";

/// Opaque, process-unique item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Uuid);

impl ItemId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content slot of a history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadState {
    /// Full-resolution payload held in memory
    Resident(Payload),
    /// Dropped to bound memory; size and label are still known
    Pruned,
}

impl PayloadState {
    pub fn is_resident(&self) -> bool {
        matches!(self, PayloadState::Resident(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            PayloadState::Resident(payload) => Some(payload),
            PayloadState::Pruned => None,
        }
    }
}

/// One recorded transformation outcome
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub(crate) payload: PayloadState,
    /// Decoded size at capture time, kept after pruning
    pub(crate) byte_size: usize,
    /// What produced this entry, e.g. "Enhanced for OCR"
    pub(crate) label: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn payload(&self) -> &PayloadState {
        &self.payload
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Display summary of an item's current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentDescriptor {
    pub label: String,
    pub byte_size: usize,
}

/// Represents a single ingested image
#[derive(Debug)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) source: SourceHandle,
    pub(crate) thumbnail: ThumbnailHandle,
    pub(crate) history: History,
    pub(crate) ingested_at: DateTime<Utc>,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Original file name
    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn thumbnail(&self) -> ThumbnailHandle {
        self.thumbnail
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    #[cfg(test)]
    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    /// Record a new transformation outcome, pruning the previous one
    pub fn append(&mut self, payload: Payload, label: impl Into<String>) -> &HistoryEntry {
        self.history.append(payload, label)
    }

    /// The content the next transformation should start from.
    ///
    /// This is the latest history payload, or the source re-read and encoded
    /// when there is none. Reading the source may hit the disk.
    pub async fn current_payload(&self) -> Result<Payload> {
        if let Some(payload) = self.history.latest_payload() {
            return Ok(payload.clone());
        }
        if !self.history.is_empty() {
            warn!(
                "⚠️  Latest revision of {} is pruned, reloading original",
                self.name()
            );
        }
        self.source.load_payload().await
    }

    /// Label and size of the current state, without touching any payload
    pub fn current_descriptor(&self) -> CurrentDescriptor {
        match self.history.latest() {
            Some(entry) => CurrentDescriptor {
                label: entry.label.clone(),
                byte_size: entry.byte_size,
            },
            None => CurrentDescriptor {
                label: ORIGINAL_LABEL.to_string(),
                byte_size: self.source.byte_size(),
            },
        }
    }
}
