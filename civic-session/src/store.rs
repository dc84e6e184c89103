use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::debug;

/// Keys the engine persists between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Server-issued id of the current guest conversation.
    GuestId,
    /// Bearer credential of the signed-in account.
    Credential,
}

impl SessionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::GuestId => "guestConversationId",
            SessionKey::Credential => "access_token",
        }
    }
}

/// Client-side key/value storage for the guest id and the credential.
///
/// Each key is stored and cleared independently. All methods take `&self`;
/// implementations handle their own locking.
pub trait SessionStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: SessionKey) -> Result<Option<String>, Self::Error>;

    fn set(&self, key: SessionKey, value: &str) -> Result<(), Self::Error>;

    fn clear(&self, key: SessionKey) -> Result<(), Self::Error>;
}

/// An in-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    data: RwLock<HashMap<SessionKey, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    type Error = Infallible;

    fn get(&self, key: SessionKey) -> Result<Option<String>, Self::Error> {
        Ok(self.data.read().get(&key).cloned())
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), Self::Error> {
        self.data.write().insert(key, value.to_string());
        Ok(())
    }

    fn clear(&self, key: SessionKey) -> Result<(), Self::Error> {
        self.data.write().remove(&key);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt session file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A JSON file holding the persisted keys, rewritten on every change.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileSessionStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| {
                SessionStoreError::Json {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(SessionStoreError::Io { path, source }),
        };

        debug!(path = %path.display(), keys = data.len(), "Opened session store");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &HashMap<String, String>) -> Result<(), SessionStoreError> {
        let io_err = |source| SessionStoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(data).map_err(|source| SessionStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

impl SessionStore for FileSessionStore {
    type Error = SessionStoreError;

    fn get(&self, key: SessionKey) -> Result<Option<String>, Self::Error> {
        Ok(self.data.lock().get(key.as_str()).cloned())
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), Self::Error> {
        let mut data = self.data.lock();
        data.insert(key.as_str().to_string(), value.to_string());
        self.flush(&data)
    }

    fn clear(&self, key: SessionKey) -> Result<(), Self::Error> {
        let mut data = self.data.lock();
        if data.remove(key.as_str()).is_some() {
            self.flush(&data)?;
        }
        Ok(())
    }
}
