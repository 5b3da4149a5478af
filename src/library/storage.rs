use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::error::StorageError;
use super::model::Artist;

/// When the store writes the library back to durable storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Save shortly after every successful mutation, off the command path.
    #[default]
    Immediate,
    /// Save only when `LibraryStore::flush` is called.
    Manual,
}

/// Durable storage the library loads from once and saves back to.
///
/// `save` may be called from a background writer while the owner flushes.
pub trait LibraryStorage: Send + Sync {
    fn load(&self) -> Result<Vec<Artist>, StorageError>;
    fn save(&self, artists: &[Artist]) -> Result<(), StorageError>;
}

const LIBRARY_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct LibraryFile {
    version: u32,
    artists: Vec<Artist>,
}

/// Stores the whole library as one pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
    // Writers share one temp file.
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "library.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LibraryStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<Artist>, StorageError> {
        if !self.path.exists() {
            info!("No library file at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let file: LibraryFile = serde_json::from_str(&content)?;
        if file.version != LIBRARY_FORMAT_VERSION {
            return Err(StorageError::Unavailable(format!(
                "unsupported library format version {} in {}",
                file.version,
                self.path.display()
            )));
        }

        info!("Loaded {} artists from {}", file.artists.len(), self.path.display());
        Ok(file.artists)
    }

    fn save(&self, artists: &[Artist]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = LibraryFile {
            version: LIBRARY_FORMAT_VERSION,
            artists: artists.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("library file lock poisoned".into()))?;
        // Write beside the target then rename so a crash never leaves half a library.
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;

        debug!("Saved {} artists to {}", artists.len(), self.path.display());
        Ok(())
    }
}

/// In-memory storage; clones share the same saved library.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    artists: Arc<Mutex<Vec<Artist>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artists(artists: Vec<Artist>) -> Self {
        Self {
            artists: Arc::new(Mutex::new(artists)),
            saves: Arc::default(),
        }
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|count| *count).unwrap_or(0)
    }

    pub fn saved_artists(&self) -> Vec<Artist> {
        self.artists.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl LibraryStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<Artist>, StorageError> {
        self.artists
            .lock()
            .map(|artists| artists.clone())
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))
    }

    fn save(&self, artists: &[Artist]) -> Result<(), StorageError> {
        let mut stored = self
            .artists
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))?;
        *stored = artists.to_vec();
        if let Ok(mut count) = self.saves.lock() {
            *count += 1;
        }
        Ok(())
    }
}
