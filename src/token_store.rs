use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::ApiError;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Durable key/value storage for session tokens.
///
/// Values are opaque; nothing here inspects or validates them.
pub trait TokenStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>, ApiError>;
    fn set(&self, name: &str, value: &str) -> Result<(), ApiError>;
    fn clear(&self, name: &str) -> Result<(), ApiError>;

    fn clear_session(&self) -> Result<(), ApiError> {
        self.clear(ACCESS_TOKEN_KEY)?;
        self.clear(REFRESH_TOKEN_KEY)
    }
}

/// Token store persisted as a flat JSON object on disk.
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ApiError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            warn!("Token file {} is corrupt: {e}", self.path.display());
            ApiError::Storage(format!("corrupt token file {}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(values)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner-only: the file holds bearer credentials.
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(raw.as_bytes())?;
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ApiError::Storage("token store lock poisoned".to_string()))?;
        let mut values = self.read_all()?;
        change(&mut values);
        self.write_all(&values)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, name: &str) -> Result<Option<String>, ApiError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ApiError::Storage("token store lock poisoned".to_string()))?;
        Ok(self.read_all()?.remove(name))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), ApiError> {
        debug!("Storing {name} in {}", self.path.display());
        self.update(|values| {
            values.insert(name.to_string(), value.to_string());
        })
    }

    fn clear(&self, name: &str) -> Result<(), ApiError> {
        debug!("Clearing {name} from {}", self.path.display());
        self.update(|values| {
            values.remove(name);
        })
    }
}

/// In-process token store; contents vanish with the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            values.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
            values.insert(REFRESH_TOKEN_KEY.to_string(), refresh.to_string());
        }
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, name: &str) -> Result<Option<String>, ApiError> {
        let values = self
            .values
            .lock()
            .map_err(|_| ApiError::Storage("token store lock poisoned".to_string()))?;
        Ok(values.get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<(), ApiError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ApiError::Storage("token store lock poisoned".to_string()))?;
        values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, name: &str) -> Result<(), ApiError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ApiError::Storage("token store lock poisoned".to_string()))?;
        values.remove(name);
        Ok(())
    }
}
