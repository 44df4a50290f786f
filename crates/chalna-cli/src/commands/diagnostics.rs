use clap::Subcommand;
use serde_json::json;

use super::{open_app, print_json, CliResult};

#[derive(Subcommand)]
pub enum DiagnosticsAction {
    /// Probe the session store with a write/read/delete round trip
    Health,
    /// Print local usage counters as JSON
    Analytics,
}

pub async fn run(action: DiagnosticsAction) -> CliResult {
    let mut app = open_app().await?;

    let result = match action {
        DiagnosticsAction::Health => {
            let health = app.health().cloned();
            let keys = app.stored_keys().await;
            print_json(&json!({
                "storage": health,
                "keys": keys,
                "lifecycle": app.lifecycle(),
                "timezone": app.timezone(),
            }))
        }
        DiagnosticsAction::Analytics => print_json(app.analytics()),
    };

    app.teardown().await;
    result
}
