//! Core error types for chalna-core.
//!
//! Validation failures are user-correctable and carry a display message.
//! Storage and calculation failures never escape the engine: they are logged,
//! reported and replaced by defaults, but the types exist so backends and
//! the crash reporter can describe what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for chalna-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Key-value storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Date arithmetic errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected birth date or life expectancy input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not a `YYYY-MM-DD` calendar date
    #[error("Please enter a valid date (YYYY-MM-DD): '{0}'")]
    InvalidFormat(String),

    /// Birth date after today
    #[error("Birth date {0} is in the future")]
    FutureDate(chrono::NaiveDate),

    /// Birth date more than 150 years ago
    #[error("Birth date {0} is more than 150 years ago")]
    TooOld(chrono::NaiveDate),

    /// Not an integer
    #[error("Please enter a whole number: '{0}'")]
    InvalidNumber(String),

    /// Outside 1..=150
    #[error("Life expectancy must be between {min} and {max} years, got {value}")]
    OutOfRange { value: i64, min: u32, max: u32 },

    /// Starting the countdown needs a birth date
    #[error("Please enter your birth date first")]
    MissingBirthDate,

    /// Lower than the age the user has already reached
    #[error("Life expectancy of {life_expectancy} years is below the current age of {current_age}")]
    BelowCurrentAge {
        life_expectancy: u32,
        current_age: u32,
    },
}

/// Key-value backend failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Backend refused the operation (injected faults, read-only media)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored value could not be encoded or decoded
    #[error("Malformed value for '{key}': {message}")]
    Malformed { key: String, message: String },
}

/// Unexpected failure inside date arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalculationError {
    /// Result falls outside the representable calendar range
    #[error("Date arithmetic overflowed while computing {0}")]
    Overflow(&'static str),

    /// Birth date has no counterpart in the target year
    #[error("No valid deadline for {birth} plus {years} years")]
    InvalidDeadline { birth: chrono::NaiveDate, years: u32 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
