//! State management module
//!
//! This module handles all engine state, including:
//! - Shared data structures (data.rs)
//! - Per-item revision history with memory pruning (history.rs)
//! - The collection of ingested items and their thumbnails (registry.rs)
//! - Text results produced by analysis stages (results.rs)

pub mod data;
pub mod history;
pub mod registry;
pub mod results;

pub use data::{CurrentDescriptor, HistoryEntry, Item, ItemId, PayloadState, ORIGINAL_LABEL};
pub use history::History;
pub use registry::{IngestFailure, IngestReport, ItemRegistry};
pub use results::{TextResult, TextResults};
