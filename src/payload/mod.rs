//! Payload handling module
//!
//! This module handles:
//! - Encoding image bytes into self-describing payloads (codec.rs)
//! - Owning original source content (source.rs)
//! - Counting payloads checked out for processing (residency.rs)
//! - Generating and tracking display thumbnails (thumbnail.rs)

pub mod codec;
pub mod residency;
pub mod source;
pub mod thumbnail;

pub use codec::{DecodedPayload, Payload, PayloadCodec};
pub use residency::{PayloadLease, ResidencyGauge};
pub use source::{SourceFile, SourceHandle, SourceOrigin};
pub use thumbnail::{Thumbnail, ThumbnailHandle, ThumbnailStore};
