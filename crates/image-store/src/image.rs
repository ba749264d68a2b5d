//! The single-slot cover image manager.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coverreel_common::error::{CoverreelError, CoverreelResult};

use crate::file_store::FileStore;

/// Fixed slot name of the stored image blob.
pub const IMAGE_SLOT: &str = "cover-image";

/// Metadata entry stored next to the blob.
pub const IMAGE_META_SLOT: &str = "cover-image.meta.json";

/// Name reported when the metadata entry is missing.
pub const FALLBACK_IMAGE_NAME: &str = "cover";

/// An image picked by the user, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// Original file name, used to keep the extension.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an image from disk, naming it after the file.
    pub fn from_path(path: &Path) -> CoverreelResult<Self> {
        if !path.exists() {
            return Err(CoverreelError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_IMAGE_NAME.to_string());
        Ok(Self { name, bytes })
    }
}

/// The persisted cover image.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub name: String,
    pub bytes: Vec<u8>,
    pub stored_at: Option<DateTime<Utc>>,
}

/// Sidecar metadata describing the stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageMetadata {
    name: String,
    size: usize,
    stored_at: DateTime<Utc>,
}

/// Presence summary used to drive the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageStatus {
    pub present: bool,
    pub name: Option<String>,
    pub size: usize,
}

impl ImageStatus {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn of(image: &StoredImage) -> Self {
        Self {
            present: true,
            name: Some(image.name.clone()),
            size: image.bytes.len(),
        }
    }

    /// One-line label, e.g. "cover.png (1024 bytes)".
    pub fn label(&self) -> String {
        match (&self.name, self.present) {
            (Some(name), true) => format!("{name} ({} bytes)", self.size),
            _ => "no image stored".to_string(),
        }
    }
}

/// Owns the one named slot in the private file area.
#[derive(Clone)]
pub struct ImageStore {
    store: Arc<dyn FileStore>,
}

impl ImageStore {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Where the underlying store keeps its entries.
    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Persist `image`, replacing whatever was stored before.
    ///
    /// The slot is left as it was when either write fails.
    pub fn save(&self, image: &ImageInput) -> CoverreelResult<StoredImage> {
        let stored_at = Utc::now();
        let metadata = ImageMetadata {
            name: image.name.clone(),
            size: image.bytes.len(),
            stored_at,
        };
        let meta_json = serde_json::to_vec(&metadata)?;

        let previous = self.store.load(IMAGE_SLOT)?;
        self.store.save(IMAGE_SLOT, &image.bytes)?;
        if let Err(e) = self.store.save(IMAGE_META_SLOT, &meta_json) {
            self.restore_blob(previous);
            return Err(e);
        }

        tracing::info!(name = %image.name, bytes = image.bytes.len(), "Stored cover image");
        Ok(StoredImage {
            name: image.name.clone(),
            bytes: image.bytes.clone(),
            stored_at: Some(stored_at),
        })
    }

    /// Put the blob back after a failed metadata write.
    fn restore_blob(&self, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(bytes) => self.store.save(IMAGE_SLOT, &bytes),
            None => self.store.delete(IMAGE_SLOT),
        };
        if let Err(e) = restored {
            tracing::warn!(error = %e, "Failed to roll back cover image after metadata error");
        }
    }

    /// Load the stored image; `None` when nothing has been stored yet.
    pub fn load(&self) -> CoverreelResult<Option<StoredImage>> {
        let Some(bytes) = self.store.load(IMAGE_SLOT)? else {
            return Ok(None);
        };

        let metadata = match self.store.load(IMAGE_META_SLOT) {
            Ok(Some(raw)) => match serde_json::from_slice::<ImageMetadata>(&raw) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable cover metadata");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unavailable cover metadata");
                None
            }
        };

        let (name, stored_at) = match metadata {
            Some(meta) => (meta.name, Some(meta.stored_at)),
            None => (FALLBACK_IMAGE_NAME.to_string(), None),
        };

        Ok(Some(StoredImage {
            name,
            bytes,
            stored_at,
        }))
    }

    /// Remove the stored image. Errors when nothing is stored.
    pub fn delete(&self) -> CoverreelResult<()> {
        self.store.delete(IMAGE_SLOT)?;
        if let Err(e) = self.store.delete(IMAGE_META_SLOT) {
            tracing::debug!(error = %e, "Cover metadata was already gone");
        }
        tracing::info!("Deleted cover image");
        Ok(())
    }

    /// Presence summary derived from a fresh load.
    pub fn status(&self) -> CoverreelResult<ImageStatus> {
        Ok(self
            .load()?
            .map(|image| ImageStatus::of(&image))
            .unwrap_or_else(ImageStatus::absent))
    }
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("location", &self.store.location())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_store::MemoryFileStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose metadata writes can be made to fail.
    struct MetaFailingStore {
        inner: MemoryFileStore,
        fail_meta: AtomicBool,
    }

    impl MetaFailingStore {
        fn new() -> Self {
            Self {
                inner: MemoryFileStore::new(),
                fail_meta: AtomicBool::new(false),
            }
        }
    }

    impl FileStore for MetaFailingStore {
        fn save(&self, name: &str, bytes: &[u8]) -> CoverreelResult<()> {
            if name == IMAGE_META_SLOT && self.fail_meta.load(Ordering::SeqCst) {
                return Err(CoverreelError::store_io("quota exceeded"));
            }
            self.inner.save(name, bytes)
        }

        fn load(&self, name: &str) -> CoverreelResult<Option<Vec<u8>>> {
            self.inner.load(name)
        }

        fn delete(&self, name: &str) -> CoverreelResult<()> {
            self.inner.delete(name)
        }

        fn location(&self) -> String {
            self.inner.location()
        }
    }

    fn memory_store() -> (Arc<MemoryFileStore>, ImageStore) {
        let backend = Arc::new(MemoryFileStore::new());
        let store = ImageStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn test_load_before_save_is_absent() {
        let (_, store) = memory_store();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.status().unwrap(), ImageStatus::absent());
    }

    #[test]
    fn test_save_keeps_original_name() {
        let (_, store) = memory_store();
        store
            .save(&ImageInput::new("pic.png", vec![1; 10]))
            .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.name, "pic.png");
        assert_eq!(loaded.bytes, vec![1; 10]);
        assert!(loaded.stored_at.is_some());
        assert_eq!(store.status().unwrap().label(), "pic.png (10 bytes)");
    }

    #[test]
    fn test_missing_metadata_falls_back_to_default_name() {
        let (backend, store) = memory_store();
        backend.save(IMAGE_SLOT, b"raw").unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.name, FALLBACK_IMAGE_NAME);
        assert_eq!(loaded.bytes, b"raw");
        assert!(loaded.stored_at.is_none());
    }

    #[test]
    fn test_delete_then_load_is_absent_and_second_delete_errors() {
        let (_, store) = memory_store();
        store.save(&ImageInput::new("a.jpg", vec![9; 3])).unwrap();
        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());

        let err = store.delete().unwrap_err();
        assert!(matches!(err, CoverreelError::StoreIo { .. }));
    }

    #[test]
    fn test_failed_metadata_write_keeps_previous_image() {
        let backend = Arc::new(MetaFailingStore::new());
        let store = ImageStore::new(backend.clone());
        store
            .save(&ImageInput::new("old.png", b"PNGDATA".to_vec()))
            .unwrap();

        backend.fail_meta.store(true, Ordering::SeqCst);
        let err = store
            .save(&ImageInput::new("new.jpg", b"JPEGDATA".to_vec()))
            .unwrap_err();
        assert!(matches!(err, CoverreelError::StoreIo { .. }));

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.name, "old.png");
        assert_eq!(loaded.bytes, b"PNGDATA");
    }

    #[test]
    fn test_failed_first_save_leaves_slot_empty() {
        let backend = Arc::new(MetaFailingStore::new());
        backend.fail_meta.store(true, Ordering::SeqCst);
        let store = ImageStore::new(backend);

        assert!(store.save(&ImageInput::new("a.jpg", vec![1; 4])).is_err());
        assert!(store.load().unwrap().is_none());
    }
}
