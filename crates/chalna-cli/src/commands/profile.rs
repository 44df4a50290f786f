use clap::Subcommand;
use serde_json::json;

use super::{open_app, print_events, print_json, CliResult};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Update one or more profile fields
    Set {
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        /// Life expectancy in whole years
        #[arg(long)]
        life_expectancy: Option<String>,
        /// Display name; an empty string clears it
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Print the stored profile as JSON
    Show,
}

pub async fn run(action: ProfileAction) -> CliResult {
    let mut app = open_app().await?;

    let result = match action {
        ProfileAction::Set {
            birth_date,
            life_expectancy,
            nickname,
        } => set(&mut app, birth_date, life_expectancy, nickname).await,
        ProfileAction::Show => {
            let state = app.state();
            print_json(&json!({
                "nickname": state.nickname,
                "birth_date": state.birth_date,
                "life_expectancy": state.life_expectancy,
                "deadline": app.deadline(),
            }))
        }
    };

    app.teardown().await;
    result
}

async fn set(
    app: &mut chalna_core::ChalnaApp,
    birth_date: Option<String>,
    life_expectancy: Option<String>,
    nickname: Option<String>,
) -> CliResult {
    if birth_date.is_none() && life_expectancy.is_none() && nickname.is_none() {
        return Err("nothing to set; pass --birth-date, --life-expectancy or --nickname".into());
    }
    if let Some(name) = nickname {
        app.set_nickname(&name).await;
    }
    let events = match (birth_date, life_expectancy) {
        (Some(birth), Some(life)) => app.set_profile(&birth, &life).await?,
        (Some(birth), None) => app.set_birth_date(&birth).await?,
        (None, Some(life)) => app.set_life_expectancy(&life).await?,
        (None, None) => Vec::new(),
    };
    print_events(&events)
}
