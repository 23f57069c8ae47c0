//! Shopfront CLI - migrations, catalog seeding and user management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sf-cli migrate
//!
//! # Load products from YAML (optionally replacing the catalog)
//! sf-cli seed catalog catalog.yaml --clear
//!
//! # Create an admin user
//! sf-cli user create -u ops -e ops@example.com -p 'correct horse' -r admin
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products from a YAML file
    Catalog {
        /// Path to the YAML file
        path: String,

        /// Delete all existing products first
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Display name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`customer`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
    /// Grant the admin role to an existing user
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
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
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { path, clear } => commands::seed::catalog(&path, clear).await?,
        },
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                password,
                role,
            } => {
                commands::user::create(&username, &email, &password, &role).await?;
            }
            UserAction::Promote { email } => commands::user::promote(&email).await?,
        },
    }
    Ok(())
}
