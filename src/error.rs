//! Error types for the engine
//!
//! Every fallible engine operation returns [`EngineError`]. Failures reported
//! by a remote capability are carried as [`CapabilityError`] inside a
//! [`TransformationError`], which also remembers which stage failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::data::ItemId;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Ingested content does not declare an image type
    #[error("{name} is not an image (declared type: {declared_type})")]
    Validation { name: String, declared_type: String },

    #[error("item {0} is not in the registry")]
    NotFound(ItemId),

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    /// Export was attempted on an entry whose payload has been pruned
    #[error("latest revision of {name} is no longer held in memory")]
    MemoryPruned { id: ItemId, name: String },

    /// The persistent export location refused the write
    #[error("permission denied writing {}", path.display())]
    Permission { path: PathBuf },

    /// The user backed out of a destination picker
    #[error("export cancelled by user")]
    UserCancelled,

    #[error("malformed payload: {0}")]
    Codec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// True for failures the caller should not surface to the user
    pub fn is_silent(&self) -> bool {
        matches!(self, EngineError::UserCancelled)
    }
}

/// Why a remote capability call produced nothing usable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// Rate limit or usage quota exhausted on the remote side
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The capability declined the request (safety filter, policy, ...)
    #[error("request refused: {0}")]
    Refused(String),

    #[error("capability returned no content")]
    EmptyResponse,

    /// Output came back but cannot be used (not an image, undecodable)
    #[error("unusable output: {0}")]
    InvalidOutput(String),

    /// Transport failure, timeout, or a source that could not be read
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

/// A pipeline stage failed; carries the stage label for display
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stage '{stage}' failed: {source}")]
pub struct TransformationError {
    pub stage: String,
    #[source]
    pub source: CapabilityError,
}

impl TransformationError {
    pub fn new(stage: impl Into<String>, source: CapabilityError) -> Self {
        Self {
            stage: stage.into(),
            source,
        }
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self.source, CapabilityError::QuotaExhausted(_))
    }

    /// Actionable hint to show next to the error message, if any
    pub fn guidance(&self) -> Option<&'static str> {
        match self.source {
            CapabilityError::QuotaExhausted(_) => Some(
                "The processing quota is used up. Wait for it to reset or switch to a key with remaining quota, then run the batch again.",
            ),
            CapabilityError::Refused(_) => {
                Some("The request was refused. Rephrase the instruction or try a different image.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_guidance() {
        let err = TransformationError::new(
            "Enhanced for OCR",
            CapabilityError::QuotaExhausted("429".into()),
        );
        assert!(err.is_quota_exhausted());
        assert!(err.guidance().is_some());
        assert_eq!(
            err.to_string(),
            "stage 'Enhanced for OCR' failed: quota exhausted: 429"
        );
    }

    #[test]
    fn test_plain_failure_has_no_guidance() {
        let err = TransformationError::new("Preprocessed", CapabilityError::EmptyResponse);
        assert!(!err.is_quota_exhausted());
        assert!(err.guidance().is_none());
    }

    #[test]
    fn test_only_cancellation_is_silent() {
        assert!(EngineError::UserCancelled.is_silent());
        assert!(!EngineError::Codec("x".into()).is_silent());
    }
}
