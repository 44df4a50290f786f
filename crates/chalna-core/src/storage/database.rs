//! SQLite-backed key-value store.
//!
//! One `kv` table holds every persisted session key. Values are stored as the
//! JSON text produced by [`SessionStateStore`](super::SessionStateStore).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, KeyValueStore};
use crate::error::{CoreError, StorageError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `~/.config/chalna/chalna.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or the database cannot be opened.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("chalna.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    ///
    /// # Errors
    /// Returns [`StorageError::OpenFailed`] if the file cannot be opened.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection mutex poisoned".into()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.conn()?.execute("DELETE FROM kv", [])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = SqliteStore::open_memory().unwrap();
        assert!(db.get("test").unwrap().is_none());
        db.set("test", "hello").unwrap();
        assert_eq!(db.get("test").unwrap().unwrap(), "hello");
        db.set("test", "world").unwrap();
        assert_eq!(db.get("test").unwrap().unwrap(), "world");
        db.remove("test").unwrap();
        assert!(db.get("test").unwrap().is_none());
    }

    #[test]
    fn clear_and_keys() {
        let db = SqliteStore::open_memory().unwrap();
        db.set("b", "2").unwrap();
        db.set("a", "1").unwrap();
        assert_eq!(db.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
        db.clear().unwrap();
        assert!(db.keys().unwrap().is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chalna.db");
        {
            let db = SqliteStore::open_at(&path).unwrap();
            db.set("birthDate", "\"2000-01-01\"").unwrap();
        }
        let db = SqliteStore::open_at(&path).unwrap();
        assert_eq!(db.get("birthDate").unwrap().as_deref(), Some("\"2000-01-01\""));
    }
}
