//! Where key files live.
//!
//! A storage target is anything that can write a named file and say where
//! it writes: a mounted USB stick, a local directory, or memory in tests.

use crate::config::PRIVATE_KEY_FILE;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Storage backend for key files.
pub trait KeyStorage {
    /// Write `data` under `file_name`, replacing any existing file whole.
    fn save_bytes(&self, data: &[u8], file_name: &str) -> Result<()>;

    /// Location files are written to, if one is selected.
    fn selected_target(&self) -> Option<PathBuf>;

    /// Read `file_name` from the selected target.
    fn read_bytes(&self, file_name: &str) -> Result<Vec<u8>> {
        let target = self.selected_target().ok_or(Error::NoStorageTarget)?;
        let path = target.join(file_name);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::KeyNotFound(path),
            _ => Error::Io(e),
        })
    }

    /// Whether the wrapped private key is present.
    fn has_keys(&self) -> bool {
        self.read_bytes(PRIVATE_KEY_FILE).is_ok()
    }
}

/// Replace `path` with `data` via a temporary file in the same directory.
///
/// Either the whole new content lands at `path` or nothing changes there.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Key files in a directory on any mounted filesystem.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStorage {
    target: Option<PathBuf>,
}

impl DirectoryStorage {
    /// Storage rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: Some(dir.into()),
        }
    }

    /// Storage with nothing selected yet.
    pub fn unselected() -> Self {
        Self::default()
    }

    /// Select (or change) the target directory.
    pub fn select(&mut self, dir: impl Into<PathBuf>) {
        self.target = Some(dir.into());
    }
}

impl KeyStorage for DirectoryStorage {
    fn save_bytes(&self, data: &[u8], file_name: &str) -> Result<()> {
        let target = self.target.as_ref().ok_or(Error::NoStorageTarget)?;
        let path = target.join(file_name);
        write_atomic(&path, data)?;
        log::info!("Saved {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    fn selected_target(&self) -> Option<PathBuf> {
        self.target.clone()
    }
}

/// In-memory storage, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

/// Pseudo-path reported by [`MemoryStorage`].
const MEMORY_TARGET: &str = "memory:";

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of stored files, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.files.read() {
            Ok(files) => files.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        names.sort();
        names
    }

    /// Overwrite a stored file directly.
    pub fn put(&self, file_name: &str, data: Vec<u8>) {
        let mut files = self.files.write().unwrap_or_else(|p| p.into_inner());
        files.insert(file_name.to_string(), data);
    }
}

impl KeyStorage for MemoryStorage {
    fn save_bytes(&self, data: &[u8], file_name: &str) -> Result<()> {
        self.put(file_name, data.to_vec());
        Ok(())
    }

    fn selected_target(&self) -> Option<PathBuf> {
        Some(PathBuf::from(MEMORY_TARGET))
    }

    fn read_bytes(&self, file_name: &str) -> Result<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(|p| p.into_inner());
        files
            .get(file_name)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(PathBuf::from(MEMORY_TARGET).join(file_name)))
    }
}

impl<S: KeyStorage + ?Sized> KeyStorage for &S {
    fn save_bytes(&self, data: &[u8], file_name: &str) -> Result<()> {
        (**self).save_bytes(data, file_name)
    }

    fn selected_target(&self) -> Option<PathBuf> {
        (**self).selected_target()
    }

    fn read_bytes(&self, file_name: &str) -> Result<Vec<u8>> {
        (**self).read_bytes(file_name)
    }

    fn has_keys(&self) -> bool {
        (**self).has_keys()
    }
}
