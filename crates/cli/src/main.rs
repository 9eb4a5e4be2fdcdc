//! Address Book CLI - Database migrations.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! address-book-cli migrate
//!
//! # Show which migrations are applied
//! address-book-cli migrate --status
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "address-book-cli")]
#[command(author, version, about = "Address book service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        /// List migrations and whether they are applied instead of running them
        #[arg(long)]
        status: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { status: false } => commands::migrate::run().await?,
        Commands::Migrate { status: true } => commands::migrate::status().await?,
    }
    Ok(())
}
