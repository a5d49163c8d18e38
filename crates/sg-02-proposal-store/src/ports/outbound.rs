//! # Outbound Ports (Driven Ports)
//!
//! The key-value engine the store persists into. The engine guarantees
//! per-key linearizability and durability-on-return for `put`; nothing here
//! assumes multi-key transactions.

use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by a key-value engine.
#[derive(Debug, Clone, Error)]
pub enum KvStoreError {
    /// The engine's backing medium failed.
    #[error("kv i/o error: {message}")]
    Io {
        /// Engine-specific description.
        message: String,
    },

    /// The engine detected its own on-disk state is damaged.
    #[error("kv corruption: {message}")]
    Corruption {
        /// Engine-specific description.
        message: String,
    },
}

/// Abstract interface for key-value database operations.
///
/// Production: a durable embedded engine supplied by the host process.
/// Testing and devnets: [`InMemoryKvStore`] (below).
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvStoreError>;

    /// Put a key-value pair; durable when the call returns.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvStoreError>;

    /// Delete a key. Deleting an absent key is a no-op.
    fn delete(&self, key: &[u8]) -> Result<(), KvStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KvStoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory key-value store for unit tests and single-process devnets.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKvStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KvStoreError> {
        Ok(self.data.read().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_roundtrip() {
        let store = InMemoryKvStore::new();

        store.put(b"key1", b"value1").unwrap();
        store.put(b"key2", b"value2").unwrap();

        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"key3").unwrap(), None);
        assert!(store.exists(b"key2").unwrap());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_in_memory_overwrite_and_delete() {
        let store = InMemoryKvStore::new();

        store.put(b"key", b"a").unwrap();
        store.put(b"key", b"b").unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"b".to_vec()));

        store.delete(b"key").unwrap();
        store.delete(b"key").unwrap();
        assert!(!store.exists(b"key").unwrap());
    }
}
