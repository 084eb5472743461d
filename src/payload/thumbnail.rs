//! Display thumbnails and the handles the presentation layer holds on them
//!
//! Thumbnails are produced once at ingestion. The registry owns every
//! handle and releases each one exactly once, on removal or teardown.

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default edge length of generated thumbnails (square bound)
pub const THUMBNAIL_SIZE: u32 = 256;

/// Revocable reference to a thumbnail held by [`ThumbnailStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailHandle(u64);

/// Display-ready thumbnail content
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

/// Build a thumbnail from source content.
///
/// Decoding and resizing are CPU-bound, so they run on the blocking pool.
/// Content the decoder does not understand is shown as-is.
pub async fn build_thumbnail(source: Vec<u8>, mime_type: String, size: u32) -> Thumbnail {
    tokio::task::spawn_blocking(move || build_thumbnail_blocking(source, mime_type, size))
        .await
        .unwrap_or_else(|e| {
            warn!("⚠️  Thumbnail task failed: {}", e);
            Thumbnail {
                mime_type: "application/octet-stream".to_string(),
                bytes: Arc::from(Vec::new()),
            }
        })
}

fn build_thumbnail_blocking(source: Vec<u8>, mime_type: String, size: u32) -> Thumbnail {
    match downscale(&source, size) {
        Some(jpeg) => Thumbnail {
            mime_type: ImageFormat::Jpeg.to_mime_type().to_string(),
            bytes: Arc::from(jpeg),
        },
        None => {
            debug!("Thumbnail decode failed, sharing original bytes");
            Thumbnail {
                mime_type,
                bytes: Arc::from(source),
            }
        }
    }
}

/// Decode, resize and re-encode as JPEG
fn downscale(source: &[u8], size: u32) -> Option<Vec<u8>> {
    let img = image::load_from_memory(source).ok()?;
    let thumbnail = img.resize(size, size, FilterType::Lanczos3);

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(thumbnail.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg).ok()?;
    Some(out.into_inner())
}

/// Owner of all live thumbnails
#[derive(Debug, Default)]
pub struct ThumbnailStore {
    next_id: u64,
    live: HashMap<ThumbnailHandle, Thumbnail>,
    released: u64,
}

impl ThumbnailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, thumbnail: Thumbnail) -> ThumbnailHandle {
        // Ids are never reused, so a stale handle can't alias a new thumbnail
        self.next_id += 1;
        let handle = ThumbnailHandle(self.next_id);
        self.live.insert(handle, thumbnail);
        handle
    }

    pub fn get(&self, handle: ThumbnailHandle) -> Option<&Thumbnail> {
        self.live.get(&handle)
    }

    /// Release one handle. Returns false if it was already released.
    pub(crate) fn release(&mut self, handle: ThumbnailHandle) -> bool {
        if self.live.remove(&handle).is_some() {
            self.released += 1;
            true
        } else {
            warn!("⚠️  Thumbnail {:?} released twice", handle);
            false
        }
    }

    /// Release every outstanding handle, returning how many were released
    pub(crate) fn release_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        self.released += count as u64;
        count
    }

    /// Number of handles not yet released
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    /// Total releases over the store's lifetime
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_thumbnail_is_downscaled_jpeg() {
        let thumb = build_thumbnail(png_bytes(600, 300), "image/png".into(), 64).await;
        assert_eq!(thumb.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 32);
    }

    #[tokio::test]
    async fn test_undecodable_content_shared_as_is() {
        let thumb = build_thumbnail(vec![1, 2, 3], "image/heic".into(), 64).await;
        assert_eq!(thumb.mime_type, "image/heic");
        assert_eq!(&thumb.bytes[..], &[1, 2, 3]);
    }

    #[test]
    fn test_release_exactly_once() {
        let mut store = ThumbnailStore::new();
        let thumb = Thumbnail {
            mime_type: "image/png".into(),
            bytes: Arc::from(vec![0u8]),
        };
        let a = store.register(thumb.clone());
        let b = store.register(thumb);
        assert_ne!(a, b);
        assert_eq!(store.outstanding(), 2);

        assert!(store.release(a));
        assert!(!store.release(a));
        assert_eq!(store.release_all(), 1);
        assert_eq!(store.release_all(), 0);
        assert_eq!(store.outstanding(), 0);
        assert_eq!(store.released_count(), 2);
    }
}
