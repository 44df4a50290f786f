use clap::Subcommand;
use serde_json::json;

use super::{open_app, print_events, print_json, CliResult};

#[derive(Subcommand)]
pub enum MilestoneAction {
    /// List milestones and whether each has been reached
    List,
    /// Enable or disable milestone checks
    Toggle,
    /// Switch between the real and the short test milestone set
    TestMode,
    /// Make every milestone eligible again
    Reset,
    /// Record a data export
    Export,
    /// Print usage statistics as JSON
    Stats,
}

pub async fn run(action: MilestoneAction) -> CliResult {
    let mut app = open_app().await?;

    let result = match action {
        MilestoneAction::List => {
            let tracker = app.milestones();
            let ledger = tracker.ledger();
            let rows: Vec<_> = tracker
                .milestones()
                .iter()
                .map(|m| {
                    json!({
                        "id": m.id,
                        "trigger": m.trigger,
                        "priority": m.priority,
                        "reached": ledger.triggered.contains(m.id),
                    })
                })
                .collect();
            print_json(&json!({
                "enabled": ledger.enabled,
                "test_mode": ledger.test_mode,
                "milestones": rows,
            }))
        }
        MilestoneAction::Toggle => {
            let enabled = app.toggle_milestones().await;
            print_json(&json!({ "enabled": enabled }))
        }
        MilestoneAction::TestMode => {
            let test_mode = app.toggle_milestone_test_mode().await;
            print_json(&json!({ "test_mode": test_mode }))
        }
        MilestoneAction::Reset => {
            app.reset_milestones().await;
            Ok(())
        }
        MilestoneAction::Export => {
            let events = app.record_export().await;
            print_events(&events)
        }
        MilestoneAction::Stats => {
            let now = app.now();
            print_json(&app.milestones().usage_stats(now.utc))
        }
    };

    app.teardown().await;
    result
}
