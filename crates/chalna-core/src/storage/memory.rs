//! In-memory key-value store with fault injection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::StorageError;

/// Volatile store for tests and ephemeral sessions.
///
/// `fail_next(n)` makes the next `n` operations fail, which is how the
/// retry-once policy and the health check are exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    failures: AtomicU32,
    /// Corrupt every value read back (health-check integrity tests).
    corrupt_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` operations with [`StorageError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    /// Raw stored text, bypassing fault injection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StorageError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("entries mutex poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        let value = self.entries()?.get(key).cloned();
        if self.corrupt_reads.load(Ordering::SeqCst) {
            return Ok(value.map(|_| "{\"corrupted\":true}".to_string()));
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.check()?;
        self.entries()?.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        Ok(self.entries()?.keys().cloned().collect())
    }
}
