pub mod in_memory_kv_store;
pub mod json_file_kv_store;
pub mod kv_store;

pub use in_memory_kv_store::InMemoryKvStore;
pub use json_file_kv_store::JsonFileKvStore;
pub use kv_store::{KeyValueStore, LAST_LANGUAGE_KEY, StorageError, StorageResult};
