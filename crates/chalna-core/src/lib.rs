//! # Chalna Core Library
//!
//! Core logic for Chalna, a "memento mori" countdown: given a birth date and
//! a life expectancy, it shows how many years, months, days, hours, minutes
//! and seconds remain. A standalone CLI drives the same library any GUI host
//! would.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: A wall-clock state machine. The caller drives it by
//!   calling `tick()` once per second; each call recomputes from scratch, so
//!   missed ticks never accumulate drift
//! - **Background Sync**: Pauses ticking while the app is backgrounded or in
//!   a sleep window and reconciles on return, including timezone changes
//! - **Storage**: A key-value session store (SQLite or in-memory) with retry
//!   and health checks, plus TOML configuration
//!
//! ## Key Components
//!
//! - [`ChalnaApp`]: Composition root wiring every service together
//! - [`CountdownEngine`]: Deadline tracking and breakdown events
//! - [`BackgroundSyncCoordinator`]: Lifecycle and timezone reconciliation
//! - [`SessionStateStore`]: Persisted session state
//! - [`TickScheduler`] / [`TickDriver`]: The single 1 Hz tick source

pub mod analytics;
pub mod app;
pub mod clock;
pub mod countdown;
pub mod crash;
pub mod deadline;
pub mod error;
pub mod events;
pub mod i18n;
pub mod milestones;
pub mod notification;
pub mod profile;
pub mod scheduler;
pub mod sleep_mode;
pub mod storage;
pub mod sync;
pub mod validation;

pub use app::{AppServices, ChalnaApp};
pub use clock::{Clock, ManualClock, Moment, SystemClock, TimezoneFingerprint};
pub use countdown::{compute_remaining, Countdown, CountdownEngine, RemainingTime};
pub use crash::{CrashReporter, MemoryCrashReporter, TracingCrashReporter};
pub use deadline::{compute_deadline, Deadline};
pub use error::{CalculationError, ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use profile::{BirthDate, LifeExpectancy, Profile};
pub use scheduler::{RunConditions, TickDriver, TickScheduler};
pub use sleep_mode::SleepSettings;
pub use storage::{Config, KeyValueStore, MemoryStore, SessionState, SessionStateStore, SqliteStore};
pub use sync::{AppLifecyclePhase, BackgroundSyncCoordinator, Notice, SyncPhase};
pub use validation::{validate_birth_date, validate_life_expectancy, validate_profile};
