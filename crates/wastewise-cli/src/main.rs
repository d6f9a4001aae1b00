use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod platform;

#[derive(Parser)]
#[command(name = "wastewise-cli", version, about = "Wastewise notification engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scheduled reminders and engagement notifications
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Notification permission
    Permission {
        #[command(subcommand)]
        action: commands::permission::PermissionAction,
    },
    /// Recycling activity diary
    Activity {
        #[command(subcommand)]
        action: commands::activity::ActivityAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WASTEWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Notify { action } => commands::notify::run(action).await,
        Commands::Permission { action } => commands::permission::run(action).await,
        Commands::Activity { action } => commands::activity::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
