#![forbid(unsafe_code)]

pub mod persistence;
pub mod repository;
pub mod sqlite;

pub use persistence::PersistenceStore;
pub use repository::{CacheStorage, InMemoryRepository, KeyValueStore, Storage, StorageError};
