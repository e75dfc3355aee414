use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use commands::{cmd_check, cmd_create, cmd_remove, cmd_show, cmd_status};
use config::{load_settings, open_store};

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ccr_syncer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { job } => cmd_check(&job),
        Commands::Create { job } => {
            let settings = load_settings(&cli.config)?;
            let store = open_store(&settings)?;
            cmd_create(&store, &job)
        }
        Commands::Status => {
            let settings = load_settings(&cli.config)?;
            let store = open_store(&settings)?;
            cmd_status(&store)
        }
        Commands::Show { name } => {
            let settings = load_settings(&cli.config)?;
            let store = open_store(&settings)?;
            cmd_show(&store, &name)
        }
        Commands::Remove { name, yes } => {
            let settings = load_settings(&cli.config)?;
            let store = open_store(&settings)?;
            cmd_remove(&store, &name, yes)
        }
    }
}
