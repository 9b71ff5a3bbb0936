use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use storefront::commands;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Product catalog service with an admin back-office", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Configuration file (default: ./storefront.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Listen address, overriding server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the password digest for an account entry
    HashPassword {
        password: String,
    },
    /// Load and validate the configuration, then exit
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => {
            commands::serve::execute(config.as_deref(), bind.as_deref()).await
        },
        Commands::HashPassword { password } => commands::hash_password(&password),
        Commands::CheckConfig { config } => commands::check_config::execute(config.as_deref()),
    }
}
