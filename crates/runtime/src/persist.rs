//! Persistent configuration storage
//!
//! The last applied configuration is kept so the engine can restore it at
//! boot and answer configuration requests. `FileConfigStore` keeps it in one
//! file, replaced atomically through a temporary sibling and a rename.

use crate::error::PersistError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait ConfigStore: Send + Sync {
    /// The stored configuration, if any
    fn load(&self) -> Result<Option<Vec<u8>>, PersistError>;

    fn save(&self, bytes: &[u8]) -> Result<(), PersistError>;

    fn clear(&self) -> Result<(), PersistError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<Vec<u8>>, PersistError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile store, for tests and hosts without storage
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<(), PersistError> {
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes.to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
