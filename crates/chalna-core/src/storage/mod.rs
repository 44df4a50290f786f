mod config;
pub mod database;
pub mod memory;
pub mod session;
pub mod session_store;

pub use config::{Config, DefaultsConfig, DeveloperConfig, NotificationsConfig, SyncConfig};
pub use database::SqliteStore;
pub use memory::MemoryStore;
pub use session::{keys, normalize_language, PermissionState, SessionState, SUPPORTED_LANGUAGES};
pub use session_store::{OpTicket, SessionStateStore, StorageHealth};

use std::path::PathBuf;

use crate::error::{ConfigError, StorageError};

/// Durable string key-value medium the session state lives in.
///
/// Implementations are synchronous; retry and cancellation policy live in
/// [`SessionStateStore`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Returns `~/.config/chalna[-dev]/` based on CHALNA_ENV.
///
/// Set CHALNA_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CHALNA_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("chalna-dev")
    } else {
        base_dir.join("chalna")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
