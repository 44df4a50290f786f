use clap::Subcommand;
use serde_json::json;

use super::{open_app, print_events, print_json, CliResult};

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Switch between dark and light theme
    Theme,
    /// Set the display language (ko, en, ja, zh)
    Language { code: String },
    /// Mark onboarding as finished
    Onboarded,
    /// Print the current preferences as JSON
    Show,
}

pub async fn run(action: PrefsAction) -> CliResult {
    let mut app = open_app().await?;

    let result = match action {
        PrefsAction::Theme => {
            let events = app.toggle_theme().await;
            print_events(&events)
        }
        PrefsAction::Language { code } => {
            let language = app.set_language(&code).await.to_string();
            if language != code {
                eprintln!("unsupported language '{code}', using '{language}'");
            }
            Ok(())
        }
        PrefsAction::Onboarded => {
            app.complete_onboarding().await;
            Ok(())
        }
        PrefsAction::Show => {
            let state = app.state();
            print_json(&json!({
                "dark_theme": state.is_dark_theme,
                "language": state.language,
                "onboarding_complete": state.onboarding_complete,
                "notification_permission": state.notification_permission,
            }))
        }
    };

    app.teardown().await;
    result
}
