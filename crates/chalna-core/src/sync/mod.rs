//! Lifecycle and timezone reconciliation.
//!
//! Keeps the countdown honest across backgrounding, sleep windows and
//! timezone changes, and owns the transient notices those produce.

mod coordinator;
mod notices;

pub use coordinator::{
    AppLifecyclePhase, BackgroundSyncCoordinator, PauseReason, SyncOutcome, SyncPhase,
    SyncSettings,
};
pub use notices::{Notice, NoticeBoard};
