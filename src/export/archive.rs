//! Bundle archives
//!
//! Combines a list of named binaries into one deliverable file.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::CompressionMethod;

use super::assembler::Artifact;
use crate::error::{EngineError, Result};

pub const ZIP_MIME: &str = "application/zip";

pub trait ArchiveAssembler: Send + Sync {
    /// MIME type of the produced archive
    fn mime_type(&self) -> &str;

    fn assemble(&self, files: &[Artifact]) -> Result<Vec<u8>>;
}

/// In-memory zip archive
#[derive(Debug, Default)]
pub struct ZipArchiver;

impl ArchiveAssembler for ZipArchiver {
    fn mime_type(&self) -> &str {
        ZIP_MIME
    }

    fn assemble(&self, files: &[Artifact]) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for file in files {
            zip.start_file(file.name.as_str(), options)
                .map_err(|e| EngineError::Archive(format!("{}: {}", file.name, e)))?;
            zip.write_all(&file.bytes)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| EngineError::Archive(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
