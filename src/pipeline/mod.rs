//! Transformation pipeline module
//!
//! This module handles:
//! - The capability traits remote services implement (capability.rs)
//! - Stages, labels and the auto-process chain (stage.rs)
//! - Running a chain of stages over one item (runner.rs)
//! - Offline capabilities backed by the image crate (local.rs)

pub mod capability;
pub mod local;
pub mod runner;
pub mod stage;

pub use capability::{ImageCapability, TextCapability};
pub use runner::{PipelineFailure, PipelineRun, TransformationPipeline};
pub use stage::{auto_process, Stage, StageKind};
