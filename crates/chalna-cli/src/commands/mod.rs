pub mod config;
pub mod diagnostics;
pub mod milestones;
pub mod prefs;
pub mod profile;
pub mod sleep;
pub mod timer;

use std::error::Error;
use std::sync::Arc;

use chalna_core::{
    AppServices, ChalnaApp, Config, Event, SqliteStore, SystemClock, TracingCrashReporter,
};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn Error>>;

/// Build the app over the on-disk store and restore the saved session.
pub async fn open_app() -> Result<ChalnaApp, Box<dyn Error>> {
    let config = Config::load_or_default();
    let services = AppServices {
        clock: Arc::new(SystemClock),
        backend: Arc::new(SqliteStore::open()?),
        crash: Arc::new(TracingCrashReporter::new()),
        notifier: config.notifications.platform.notifier(),
    };
    let mut app = ChalnaApp::new(config, services);
    let events = app.initialize().await?;
    tracing::debug!(count = events.len(), "restored session");
    Ok(app)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One event per line, for streaming consumers.
pub fn print_events(events: &[Event]) -> CliResult {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
