//! Coverreel Image Store
//!
//! Persists exactly one cover image across sessions in a private file
//! area. The area itself is reached through the [`FileStore`] trait so
//! the manager never touches paths directly.
//!
//! ```text
//! ImageStore ──► FileStore::save("cover-image", bytes)
//!            └─► FileStore::save("cover-image.meta.json", metadata)
//! ```

pub mod file_store;
pub mod image;

pub use file_store::{DirFileStore, FileStore, MemoryFileStore};
pub use image::*;
