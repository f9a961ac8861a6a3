//! Marketsync CLI - migrations, manual syncs and credential management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! marketsync migrate
//!
//! # Run a full catalog sync for one shop
//! marketsync sync run --shop-id 9001
//!
//! # Show recent sync runs
//! marketsync runs list --shop-id 9001 --limit 5
//!
//! # Import a credential from an authorization handshake
//! marketsync token import --shop-id 9001 --access-token ... --refresh-token ...
//!
//! # Inspect or force-refresh a shop's token
//! marketsync token status --shop-id 9001
//! marketsync token refresh --shop-id 9001
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync run` - Crawl and merge a shop's catalog
//! - `runs list` - Show the sync run log
//! - `token` - Import, inspect and refresh shop credentials

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "marketsync")]
#[command(author, version, about = "Marketplace catalog sync tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run catalog syncs
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Inspect the sync run log
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
    /// Manage shop credentials
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Run a full catalog sync using the stored credential
    Run {
        /// Marketplace shop id
        #[arg(short, long)]
        shop_id: i64,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List recent runs, newest first
    List {
        /// Marketplace shop id
        #[arg(short, long)]
        shop_id: i64,

        /// Number of runs to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Show token state and expiries
    Status {
        /// Marketplace shop id
        #[arg(short, long)]
        shop_id: i64,
    },
    /// Force a refresh exchange
    Refresh {
        /// Marketplace shop id
        #[arg(short, long)]
        shop_id: i64,
    },
    /// Store a credential obtained from the authorization handshake
    Import {
        /// Marketplace shop id
        #[arg(short, long)]
        shop_id: i64,

        /// Access token
        #[arg(short, long)]
        access_token: String,

        /// Refresh token
        #[arg(short, long)]
        refresh_token: Option<String>,

        /// Access token lifetime in seconds
        #[arg(short, long, default_value_t = 14_400)]
        expire_in: i64,
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync { action } => match action {
            SyncAction::Run { shop_id } => commands::sync::run(shop_id).await?,
        },
        Commands::Runs { action } => match action {
            RunsAction::List { shop_id, limit } => {
                commands::sync::list_runs(shop_id, limit).await?;
            }
        },
        Commands::Token { action } => match action {
            TokenAction::Status { shop_id } => commands::token::status(shop_id).await?,
            TokenAction::Refresh { shop_id } => commands::token::refresh(shop_id).await?,
            TokenAction::Import {
                shop_id,
                access_token,
                refresh_token,
                expire_in,
            } => {
                commands::token::import(shop_id, access_token, refresh_token, expire_in).await?;
            }
        },
    }
    Ok(())
}
