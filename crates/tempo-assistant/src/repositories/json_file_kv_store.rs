use std::collections::HashMap;
use std::path::PathBuf;

use super::kv_store::{BoxFuture, KeyValueStore, StorageError, StorageResult};

/// JSON-file-backed hint storage.
pub struct JsonFileKvStore {
    file_path: PathBuf,
}

impl JsonFileKvStore {
    /// Create the store with the XDG-compliant path.
    pub fn new() -> StorageResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| StorageError::Path {
            message: "Cannot determine config directory".to_string(),
        })?;

        let file_path = config_dir.join("tempo").join("session-hints.json");
        Ok(Self { file_path })
    }

    /// Create the store with a custom path (for testing)
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    async fn read_map(path: &PathBuf) -> StorageResult<HashMap<String, String>> {
        // Missing file means first run
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write_map(path: &PathBuf, map: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(map)?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }
}

impl KeyValueStore for JsonFileKvStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let path = self.file_path.clone();
        let key = key.to_string();

        Box::pin(async move {
            let map = Self::read_map(&path).await?;
            Ok(map.get(&key).cloned())
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.file_path.clone();
        let key = key.to_string();

        Box::pin(async move {
            let mut map = Self::read_map(&path).await?;
            map.insert(key, value);
            Self::write_map(&path, &map).await
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.file_path.clone();
        let key = key.to_string();

        Box::pin(async move {
            let mut map = Self::read_map(&path).await?;
            if map.remove(&key).is_some() {
                Self::write_map(&path, &map).await?;
            }
            Ok(())
        })
    }
}
