//! Capability seams
//!
//! A capability is an opaque transformation service, usually remote. The
//! engine only knows its signature: image in, image or text out, or a
//! [`CapabilityError`] explaining why nothing usable came back. Timeouts and
//! transport concerns live behind these traits.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::payload::Payload;

/// Image-to-image capability (correction, enhancement, edit, generation)
#[async_trait]
pub trait ImageCapability: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn transform(&self, input: &Payload, instruction: &str)
        -> Result<Payload, CapabilityError>;
}

/// Image-to-text capability (extraction, analysis)
#[async_trait]
pub trait TextCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, input: &Payload, instruction: &str) -> Result<String, CapabilityError>;
}
