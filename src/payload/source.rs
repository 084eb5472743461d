//! Original source content for an item
//!
//! Sources stay where they are (in memory or on disk) and are only read when
//! something needs their bytes: thumbnail generation at ingestion, the
//! fallback for an item with no history, and export of untouched items.

use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::codec::{Payload, PayloadCodec};
use crate::error::Result;

/// Fallback type for files whose extension says nothing
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Where the original bytes live
#[derive(Debug, Clone)]
pub enum SourceOrigin {
    Memory(Arc<[u8]>),
    Disk(PathBuf),
}

/// A file offered for ingestion, with the type it declares
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name (e.g. "receipt_01.jpg")
    pub name: String,
    /// Declared MIME type, trusted for validation
    pub mime_type: String,
    pub origin: SourceOrigin,
}

impl SourceFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            origin: SourceOrigin::Memory(Arc::from(bytes.into())),
        }
    }

    /// Describe a file on disk; the declared type comes from its extension
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mime_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| UNKNOWN_MIME.to_string());
        Self {
            name,
            mime_type,
            origin: SourceOrigin::Disk(path.to_path_buf()),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Read the full content
    pub async fn read(&self) -> Result<Vec<u8>> {
        match &self.origin {
            SourceOrigin::Memory(bytes) => Ok(bytes.to_vec()),
            SourceOrigin::Disk(path) => Ok(tokio::fs::read(path).await?),
        }
    }
}

/// Exclusive, read-only ownership of an item's original content
#[derive(Debug)]
pub struct SourceHandle {
    file: SourceFile,
    byte_size: usize,
}

impl SourceHandle {
    /// `byte_size` is the length observed when the source was first read
    pub(crate) fn new(file: SourceFile, byte_size: usize) -> Self {
        Self { file, byte_size }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn mime_type(&self) -> &str {
        &self.file.mime_type
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Name without its extension, used to derive export names
    pub fn base_name(&self) -> &str {
        Path::new(&self.file.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("image")
    }

    pub async fn bytes(&self) -> Result<Vec<u8>> {
        self.file.read().await
    }

    /// Read the source and encode it the same way history payloads are encoded
    pub async fn load_payload(&self) -> Result<Payload> {
        let bytes = self.bytes().await?;
        Ok(PayloadCodec::encode(self.mime_type(), &bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_from_extension() {
        assert_eq!(SourceFile::from_path(Path::new("/tmp/a.PNG")).mime_type, "image/png");
        assert_eq!(SourceFile::from_path(Path::new("/tmp/a.jpg")).mime_type, "image/jpeg");
        let notes = SourceFile::from_path(Path::new("/tmp/notes.txt"));
        assert_eq!(notes.mime_type, UNKNOWN_MIME);
        assert!(!notes.is_image());
    }

    #[test]
    fn test_base_name_strips_extension() {
        let handle =
            SourceHandle::new(SourceFile::from_bytes("scan.page1.png", "image/png", vec![1]), 1);
        assert_eq!(handle.base_name(), "scan.page1");
        let bare = SourceHandle::new(SourceFile::from_bytes(".png", "image/png", vec![1]), 1);
        assert_eq!(bare.base_name(), ".png");
    }

    #[tokio::test]
    async fn test_load_payload_matches_source_bytes() {
        let handle =
            SourceHandle::new(SourceFile::from_bytes("a.png", "image/png", vec![9, 8, 7]), 3);
        let payload = handle.load_payload().await.unwrap();
        let decoded = PayloadCodec::decode(&payload).unwrap();
        assert_eq!(decoded.bytes, vec![9, 8, 7]);
        assert_eq!(decoded.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_disk_source_read_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"pixels").unwrap();
        let file = SourceFile::from_path(&path);
        assert_eq!(file.read().await.unwrap(), b"pixels");

        std::fs::remove_file(&path).unwrap();
        assert!(file.read().await.is_err());
    }
}
