//! The ItemRegistry owns every ingested image and its display thumbnail.
//!
//! Ingestion validates the declared type, reads the source once to build a
//! thumbnail, and only then inserts the item. A rejected file never touches
//! the registry. Up to a fixed number of files are prepared concurrently;
//! insertion is always sequential and follows the order files were offered.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::data::{Item, ItemId};
use super::history::History;
use crate::error::{EngineError, Result};
use crate::payload::thumbnail::{build_thumbnail, Thumbnail, ThumbnailStore};
use crate::payload::{SourceFile, SourceHandle};

/// Result of ingesting a set of files
#[derive(Debug, Default)]
pub struct IngestReport {
    /// New item ids, in the order the files were offered
    pub ingested: Vec<ItemId>,
    pub failures: Vec<IngestFailure>,
}

/// A file that could not be ingested
#[derive(Debug)]
pub struct IngestFailure {
    pub name: String,
    pub error: EngineError,
}

/// A validated file with its thumbnail, ready to insert
struct PreparedItem {
    file: SourceFile,
    byte_size: usize,
    thumbnail: Thumbnail,
}

async fn prepare(file: SourceFile, thumbnail_size: u32) -> Result<PreparedItem> {
    if !file.is_image() {
        return Err(EngineError::Validation {
            name: file.name.clone(),
            declared_type: file.mime_type.clone(),
        });
    }

    let bytes = file.read().await?;
    let byte_size = bytes.len();
    let thumbnail = build_thumbnail(bytes, file.mime_type.clone(), thumbnail_size).await;

    Ok(PreparedItem {
        file,
        byte_size,
        thumbnail,
    })
}

/// Files prepared at once by [`ItemRegistry::ingest_many`] unless configured
pub const DEFAULT_INGEST_CONCURRENCY: usize = 4;

pub struct ItemRegistry {
    /// Items in ingestion order
    items: Vec<Item>,
    thumbnails: ThumbnailStore,
    thumbnail_size: u32,
    ingest_concurrency: usize,
}

impl ItemRegistry {
    pub fn new(thumbnail_size: u32) -> Self {
        Self {
            items: Vec::new(),
            thumbnails: ThumbnailStore::new(),
            thumbnail_size,
            ingest_concurrency: DEFAULT_INGEST_CONCURRENCY,
        }
    }

    /// Limit how many files `ingest_many` reads and thumbnails at once
    pub fn with_ingest_concurrency(mut self, limit: usize) -> Self {
        self.ingest_concurrency = limit.max(1);
        self
    }

    pub fn ingest_concurrency(&self) -> usize {
        self.ingest_concurrency
    }

    /// Validate and ingest one file
    pub async fn ingest(&mut self, file: SourceFile) -> Result<ItemId> {
        let prepared = prepare(file, self.thumbnail_size).await?;
        Ok(self.insert(prepared))
    }

    /// Ingest many files. Each file succeeds or fails on its own.
    pub async fn ingest_many(&mut self, files: Vec<SourceFile>) -> IngestReport {
        let size = self.thumbnail_size;
        let mut pending = stream::iter(files)
            .map(|file| async move {
                let name = file.name.clone();
                (name, prepare(file, size).await)
            })
            .buffered(self.ingest_concurrency);

        let mut report = IngestReport::default();
        while let Some((name, result)) = pending.next().await {
            match result {
                Ok(prepared) => report.ingested.push(self.insert(prepared)),
                Err(error) => {
                    warn!("⚠️  Skipping {}: {}", name, error);
                    report.failures.push(IngestFailure { name, error });
                }
            }
        }

        info!(
            "📥 Ingested {} files, {} rejected",
            report.ingested.len(),
            report.failures.len()
        );
        report
    }

    fn insert(&mut self, prepared: PreparedItem) -> ItemId {
        let id = ItemId::new();
        let thumbnail = self.thumbnails.register(prepared.thumbnail);
        debug!("Registered {} as {}", prepared.file.name, id);

        self.items.push(Item {
            id,
            source: SourceHandle::new(prepared.file, prepared.byte_size),
            thumbnail,
            history: History::new(),
            ingested_at: Utc::now(),
        });
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// All ids in ingestion order
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Thumbnail for display, while the item is registered
    pub fn thumbnail(&self, id: ItemId) -> Option<&Thumbnail> {
        self.get(id)
            .and_then(|item| self.thumbnails.get(item.thumbnail))
    }

    pub fn thumbnails(&self) -> &ThumbnailStore {
        &self.thumbnails
    }

    /// Release the item's thumbnail, then discard the item
    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let item = self.items.remove(index);
        self.thumbnails.release(item.thumbnail);
        info!("🗑️  Removed {}", item.name());
        Some(item)
    }

    /// Teardown: release every outstanding thumbnail and drop all items
    pub fn release_all(&mut self) -> usize {
        let released = self.thumbnails.release_all();
        self.items.clear();
        if released > 0 {
            info!("🧹 Released {} thumbnails", released);
        }
        released
    }
}

impl Drop for ItemRegistry {
    fn drop(&mut self) {
        if self.thumbnails.outstanding() > 0 {
            warn!(
                "⚠️  Registry dropped with {} live thumbnails, releasing",
                self.thumbnails.outstanding()
            );
            self.release_all();
        }
    }
}

// Implement Debug without dumping every item
impl std::fmt::Debug for ItemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemRegistry")
            .field("items", &self.items.len())
            .field("thumbnails", &self.thumbnails.outstanding())
            .finish()
    }
}
