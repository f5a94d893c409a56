//! Key/value store abstraction.
//!
//! Persistence-facing components depend on [`Store`] rather than a
//! concrete database. Production backends live outside this workspace;
//! each store handed to a component is already that component's
//! sub-namespace, so key layouts never collide across owners.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// Storage backend failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend I/O failure, surfaced verbatim.
    #[error("store io: {0}")]
    Io(String),
}

/// Byte-oriented key/value store.
///
/// `get` distinguishes "absent" from failure; callers that treat absence
/// as an error map the `None` themselves.
pub trait Store: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
}

/// In-memory [`Store`]. Cloned handles share the same map, which lets a
/// test close one engine and reopen another over the same bytes.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Store for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.inner.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
