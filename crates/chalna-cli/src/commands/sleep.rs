use clap::Subcommand;

use super::{open_app, print_events, print_json, CliResult};

#[derive(Subcommand)]
pub enum SleepAction {
    /// Print the sleep settings and current status as JSON
    Show,
    /// Change the sleep settings
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        /// Window start (HH:MM)
        #[arg(long)]
        start: Option<String>,
        /// Window end (HH:MM)
        #[arg(long)]
        end: Option<String>,
        /// Pause the countdown during the window
        #[arg(long)]
        pause_timer: Option<bool>,
        /// Silence notification updates during the window
        #[arg(long)]
        mute_notifications: Option<bool>,
    },
}

pub async fn run(action: SleepAction) -> CliResult {
    let mut app = open_app().await?;

    let result = match action {
        SleepAction::Show => {
            let now = app.now();
            let settings = app.sleep_settings();
            print_json(&serde_json::json!({
                "settings": settings,
                "status": settings.status(now.local),
            }))
        }
        SleepAction::Set {
            enabled,
            start,
            end,
            pause_timer,
            mute_notifications,
        } => {
            let mut settings = app.sleep_settings().clone();
            if let Some(enabled) = enabled {
                settings.enabled = enabled;
            }
            if let Some(start) = start {
                settings.start_time = start;
            }
            if let Some(end) = end {
                settings.end_time = end;
            }
            if let Some(pause) = pause_timer {
                settings.pause_timer = pause;
            }
            if let Some(mute) = mute_notifications {
                settings.mute_notifications = mute;
            }
            match app.set_sleep_settings(settings).await {
                Ok(events) => print_events(&events),
                Err(e) => Err(e.into()),
            }
        }
    };

    app.teardown().await;
    result
}
