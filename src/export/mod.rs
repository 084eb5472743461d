//! Export module
//!
//! This module handles:
//! - Building artifacts from items' current content (assembler.rs)
//! - Combining artifacts into one archive (archive.rs)
//! - Delivering artifacts to a granted folder or a fallback (destination.rs)

pub mod archive;
pub mod assembler;
pub mod destination;

pub use archive::{ArchiveAssembler, ZipArchiver};
pub use assembler::{artifact_name, Artifact, Bundle, ExportAssembler, SkippedExport};
pub use destination::{
    Delivery, DirectoryDestination, DownloadsFolder, ExportDestination, Exporter, SaveMechanism,
};
