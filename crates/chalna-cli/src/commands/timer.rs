use std::time::Duration;

use chalna_core::{AppLifecyclePhase, ChalnaApp, TickDriver};
use clap::Subcommand;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{open_app, print_events, print_json, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start counting down
    Start,
    /// Stop counting down
    Stop,
    /// Print the current countdown snapshot as JSON
    Status,
    /// Tick once per interval and stream events as JSON lines.
    ///
    /// Lines on stdin change the lifecycle phase: `active`, `inactive`,
    /// `background`; `quit` exits.
    Watch {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Wipe the session back to first-launch defaults
    Reset,
}

pub async fn run(action: TimerAction) -> CliResult {
    let mut app = open_app().await?;

    let result = match action {
        TimerAction::Start => match app.start().await {
            Ok(events) => print_events(&events),
            Err(e) => Err(e.into()),
        },
        TimerAction::Stop => print_events(&app.stop().await),
        TimerAction::Status => {
            app.tick().await;
            status(&app)
        }
        TimerAction::Watch { ticks } => watch(&mut app, ticks).await,
        TimerAction::Reset => print_events(&app.reset().await),
    };

    app.teardown().await;
    result
}

fn status(app: &ChalnaApp) -> CliResult {
    let translator = app.translator();
    let notices: Vec<String> = app
        .notices()
        .iter()
        .map(|notice| notice.render(&translator))
        .collect();
    print_json(&json!({
        "snapshot": app.snapshot(),
        "display": app.remaining().to_string(),
        "ticking": app.is_ticking(),
        "notices": notices,
    }))
}

fn parse_phase(line: &str) -> Option<AppLifecyclePhase> {
    match line.trim() {
        "active" => Some(AppLifecyclePhase::Active),
        "inactive" => Some(AppLifecyclePhase::Inactive),
        "background" => Some(AppLifecyclePhase::Background),
        _ => None,
    }
}

async fn watch(app: &mut ChalnaApp, ticks: Option<u64>) -> CliResult {
    let period = Duration::from_millis(app.config().sync.tick_interval_ms.max(1));
    let token = app.cancellation_token().child_token();
    let mut driver = TickDriver::new(period, token.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut left = ticks;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!("interrupted");
                token.cancel();
                break;
            }
            tick = driver.next_tick() => {
                if tick.is_none() {
                    break;
                }
                print_events(&app.tick().await)?;
                if let Some(n) = left.as_mut() {
                    *n = n.saturating_sub(1);
                    if *n == 0 {
                        break;
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                if line.trim() == "quit" {
                    break;
                }
                match parse_phase(&line) {
                    Some(phase) => {
                        print_events(&app.on_lifecycle(phase).await)?;
                        if phase.is_active() {
                            driver.restart();
                        }
                    }
                    None => eprintln!("unknown command: {}", line.trim()),
                }
            }
        }
    }

    let translator = app.translator();
    for notice in app.notices() {
        eprintln!("{}", notice.render(&translator));
    }
    Ok(())
}
