//! Batch image processing with bounded-memory revision history
//!
//! Items are ingested into an [`ItemRegistry`](state::ItemRegistry), pushed
//! through ordered stages by the [`BatchCoordinator`](batch::BatchCoordinator),
//! and exported as files or archives. Every item keeps a full list of
//! revisions but holds the encoded content of its latest one only.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod payload;
pub mod pipeline;
pub mod state;

pub use batch::{BatchJob, BatchOutcome, BatchProgress, BatchStatus};
pub use config::EngineConfig;
pub use engine::{Engine, PackedBundle};
pub use error::{CapabilityError, EngineError, Result, TransformationError};
pub use payload::{Payload, PayloadCodec, SourceFile};
pub use state::{ItemId, PayloadState};
