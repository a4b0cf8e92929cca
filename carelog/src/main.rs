// CareLog - role-gated case management
// Entry point for administrative commands

use anyhow::Context;
use carelog::app::AppState;
use carelog::diff::{diff, render_word_diff};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "carelog")]
#[command(about = "Case management store: clients, revisioned logs and goals")]
struct Cli {
    /// Directory holding the database
    #[arg(short, long, env = "CARELOG_DATA_DIR", default_value = "carelog-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and apply migrations
    Migrate,

    /// Provision the first admin account
    BootstrapAdmin {
        #[arg(long)]
        email: String,

        #[arg(long)]
        full_name: Option<String>,
    },

    /// Print the word diff between two text files
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Print the segments as JSON instead of inline markers
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carelog=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Migrate => {
            AppState::initialize(&cli.data_dir).await?;
            tracing::info!("Database ready in {:?}", cli.data_dir);
        }
        Command::BootstrapAdmin { email, full_name } => {
            let state = AppState::initialize(&cli.data_dir).await?;
            let admin = state.users.bootstrap_admin(&email, full_name).await?;
            println!("{}", admin.user_id);
        }
        Command::Diff { old, new, json } => {
            let old_text = std::fs::read_to_string(&old)
                .with_context(|| format!("failed to read {}", old.display()))?;
            let new_text = std::fs::read_to_string(&new)
                .with_context(|| format!("failed to read {}", new.display()))?;

            let segments = diff(&old_text, &new_text);
            let changed = segments.iter().filter(|s| s.is_change()).count();
            tracing::debug!("{} of {} segments changed", changed, segments.len());

            if json {
                println!("{}", serde_json::to_string_pretty(&segments)?);
            } else {
                println!("{}", render_word_diff(&segments));
            }
        }
    }

    Ok(())
}
