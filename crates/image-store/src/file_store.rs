//! Private file area backends.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use coverreel_common::error::{CoverreelError, CoverreelResult};

/// A flat, named blob store private to the current user.
pub trait FileStore: Send + Sync {
    /// Write `bytes` under `name`, replacing any prior content.
    fn save(&self, name: &str, bytes: &[u8]) -> CoverreelResult<()>;

    /// Read the blob stored under `name`, or `None` if absent.
    fn load(&self, name: &str) -> CoverreelResult<Option<Vec<u8>>>;

    /// Remove the blob stored under `name`. Fails if it does not exist.
    fn delete(&self, name: &str) -> CoverreelResult<()>;

    /// Human-readable location of the store.
    fn location(&self) -> String;
}

/// File store backed by a private directory on disk.
#[derive(Debug, Clone)]
pub struct DirFileStore {
    root: PathBuf,
}

impl DirFileStore {
    /// Open (creating if needed) the private area rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CoverreelResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            CoverreelError::store_unsupported(format!(
                "cannot create private area {}: {e}",
                root.display()
            ))
        })?;
        if !root.is_dir() {
            return Err(CoverreelError::store_unsupported(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        restrict_permissions(&root);
        tracing::debug!(root = %root.display(), "Opened private file area");
        Ok(Self { root })
    }

    /// Root directory of the area.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> CoverreelResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

impl FileStore for DirFileStore {
    fn save(&self, name: &str, bytes: &[u8]) -> CoverreelResult<()> {
        let target = self.entry_path(name)?;
        let temp = self.root.join(format!(".{name}.partial"));

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            std::fs::rename(&temp, &target)
        };

        write().map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            CoverreelError::store_io(format!("failed to save {name}: {e}"))
        })?;

        tracing::debug!(name, bytes = bytes.len(), "Saved store entry");
        Ok(())
    }

    fn load(&self, name: &str) -> CoverreelResult<Option<Vec<u8>>> {
        let path = self.entry_path(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoverreelError::store_io(format!(
                "failed to load {name}: {e}"
            ))),
        }
    }

    fn delete(&self, name: &str) -> CoverreelResult<()> {
        let path = self.entry_path(name)?;
        std::fs::remove_file(&path)
            .map_err(|e| CoverreelError::store_io(format!("failed to delete {name}: {e}")))?;
        tracing::debug!(name, "Deleted store entry");
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-process file store with the same semantics as [`DirFileStore`].
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> CoverreelResult<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| CoverreelError::store_io("memory store lock poisoned"))
    }
}

impl FileStore for MemoryFileStore {
    fn save(&self, name: &str, bytes: &[u8]) -> CoverreelResult<()> {
        validate_name(name)?;
        self.entries()?.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, name: &str) -> CoverreelResult<Option<Vec<u8>>> {
        validate_name(name)?;
        Ok(self.entries()?.get(name).cloned())
    }

    fn delete(&self, name: &str) -> CoverreelResult<()> {
        validate_name(name)?;
        self.entries()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoverreelError::store_io(format!("failed to delete {name}: not found")))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Entry names are single, non-hidden path components.
fn validate_name(name: &str) -> CoverreelResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(CoverreelError::store_io(format!(
            "invalid store entry name: {name:?}"
        )))
    }
}

#[cfg(unix)]
fn restrict_permissions(root: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(root, std::fs::Permissions::from_mode(0o700)) {
        tracing::warn!(root = %root.display(), error = %e, "Could not restrict private area permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_root: &Path) {}
