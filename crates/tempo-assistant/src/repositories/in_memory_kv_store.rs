use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::kv_store::{BoxFuture, KeyValueStore, StorageResult};

/// In-memory hint storage for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let values = self.values.clone();
        let key = key.to_string();

        Box::pin(async move { Ok(values.lock().get(&key).cloned()) })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let values = self.values.clone();
        let key = key.to_string();

        Box::pin(async move {
            values.lock().insert(key, value);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, StorageResult<()>> {
        let values = self.values.clone();
        let key = key.to_string();

        Box::pin(async move {
            values.lock().remove(&key);
            Ok(())
        })
    }
}
