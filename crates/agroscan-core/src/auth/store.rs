use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Storage file name in the data directory
const STORAGE_FILE: &str = "storage.json";

/// Keys persisted by the client. The string forms match what the backend's
/// other clients store, so a shared device profile stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    /// Serialized `SessionData` (contains the request token)
    User,
    /// Tenant identifier sent as the `id-company` header
    CompanyId,
    Uid,
    /// Identity token used as bearer on image uploads
    IdToken,
    Token,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::User,
        StorageKey::CompanyId,
        StorageKey::Uid,
        StorageKey::IdToken,
        StorageKey::Token,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::User => "user",
            StorageKey::CompanyId => "id-company",
            StorageKey::Uid => "uid",
            StorageKey::IdToken => "idToken",
            StorageKey::Token => "token",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent key-value storage holding the session.
///
/// Implementations must not cache: every `get` reflects the latest `set` or
/// `remove`, including ones made by another handle to the same storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: StorageKey) -> Result<Option<String>>;
    async fn set(&self, key: StorageKey, value: &str) -> Result<()>;
    async fn remove(&self, key: StorageKey) -> Result<()>;
}

/// In-process storage, used in tests and when nothing should touch disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.is_empty())
            .unwrap_or(true)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        entries.insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        entries.remove(&key);
        Ok(())
    }
}

/// JSON-file storage: a single `{ key: value }` map, rewritten atomically
/// on every change and re-read on every access.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join(STORAGE_FILE),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path).context("Failed to read storage file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse storage file")
    }

    fn write_map(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&tmp, contents).context("Failed to write storage file")?;
        std::fs::rename(&tmp, path).context("Failed to replace storage file")?;
        Ok(())
    }

    /// Run a blocking operation on the storage map off the async runtime
    async fn with_map<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().map_err(|_| anyhow!("storage lock poisoned"))?;
            op(&path)
        })
        .await
        .context("Storage task failed")?
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>> {
        self.with_map(move |path| {
            let mut map = Self::read_map(path)?;
            Ok(map.remove(key.as_str()))
        })
        .await
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        let value = value.to_string();
        self.with_map(move |path| {
            let mut map = Self::read_map(path)?;
            map.insert(key.as_str().to_string(), value);
            Self::write_map(path, &map)
        })
        .await
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        self.with_map(move |path| {
            let mut map = Self::read_map(path)?;
            if map.remove(key.as_str()).is_some() {
                debug!(key = key.as_str(), "Removed storage entry");
                Self::write_map(path, &map)?;
            }
            Ok(())
        })
        .await
    }
}
