use crate::model::TableName;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize table {table}: {source}")]
    Serialize {
        table: TableName,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write table {table}: {source}")]
    Write {
        table: TableName,
        #[source]
        source: io::Error,
    },
}

/// A durable key-value slot holding one serialized table per key.
pub trait Backend: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: String) -> io::Result<()>;
}

/// In-process backing. Clones share the same slots, so several stores built on
/// clones of one `MemoryBackend` behave like tabs over one browser profile.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a slot with an arbitrary payload, bypassing serialization.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.get_raw(key))
    }

    fn write(&self, key: &str, value: String) -> io::Result<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON file per table under `dir`.
#[derive(Clone, Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: String) -> io::Result<()> {
        fs::write(self.path(key), value)
    }
}

/// Saves and loads whole tables. There is no transaction log: a failed write
/// leaves whatever the backend held before.
#[derive(Clone)]
pub struct PersistenceAdapter {
    backend: Arc<dyn Backend>,
}

impl PersistenceAdapter {
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn save<T: Serialize>(&self, table: TableName, records: &[T]) -> Result<(), PersistError> {
        let raw = serde_json::to_string_pretty(records)
            .map_err(|source| PersistError::Serialize { table, source })?;
        self.backend
            .write(table.as_str(), raw)
            .map_err(|source| PersistError::Write { table, source })
    }

    /// Fails when the backing cannot be read at all. An absent slot is fine.
    pub fn probe(&self) -> io::Result<()> {
        self.backend.read(TableName::Jobs.as_str()).map(|_| ())
    }

    /// Reads a table, falling back to `seed` when the slot is absent, cannot be
    /// read, or does not hold a sequence of valid records.
    pub fn load<T: DeserializeOwned>(&self, table: TableName, seed: Vec<T>) -> Vec<T> {
        let raw = match self.backend.read(table.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%table, "No durable state, using seed");
                return seed;
            }
            Err(e) => {
                warn!(%table, error = %e, "Unreadable durable state, using seed");
                return seed;
            }
        };
        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(%table, error = %e, "Malformed durable state, using seed");
                seed
            }
        }
    }
}
