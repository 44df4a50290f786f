use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "chalna-cli", version, about = "Chalna CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Birth date, life expectancy and nickname
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Countdown control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Theme, language and onboarding
    Prefs {
        #[command(subcommand)]
        action: commands::prefs::PrefsAction,
    },
    /// Sleep mode window
    Sleep {
        #[command(subcommand)]
        action: commands::sleep::SleepAction,
    },
    /// Usage milestones
    Milestones {
        #[command(subcommand)]
        action: commands::milestones::MilestoneAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Storage health and local analytics
    Diagnostics {
        #[command(subcommand)]
        action: commands::diagnostics::DiagnosticsAction,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CHALNA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Profile { action } => commands::profile::run(action).await,
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Prefs { action } => commands::prefs::run(action).await,
        Commands::Sleep { action } => commands::sleep::run(action).await,
        Commands::Milestones { action } => commands::milestones::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Diagnostics { action } => commands::diagnostics::run(action).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
