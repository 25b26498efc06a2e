use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key under which the last-used assistant language is stored.
pub const LAST_LANGUAGE_KEY: &str = "last-language";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage path unavailable: {message}")]
    Path { message: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Small persisted key-value storage for ephemeral session hints. Kept
/// behind a trait so a non-browser target can swap the backend.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>>;

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>>;

    fn remove(&self, key: &str) -> BoxFuture<'static, StorageResult<()>>;
}
