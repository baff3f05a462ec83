//! CLI module for Lessonloom
//!
//! Provides commands:
//! - `backends`: manage configured AI backends
//! - `generate`: run one prompt through the router
//! - `stats`: per-backend usage statistics
//! - `share`: encrypted backend bundles
//! - `seed`: add backends from provider API-key environment variables

use crate::config::AppConfig;
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use lessonloom_llm::{FileKvStore, HttpBackendFactory, Router};
use lessonloom_share::{FileBlobStore, ShareService};
use std::sync::Arc;
use tracing::debug;

pub mod backends;
pub mod generate;
pub mod secret;
pub mod seed;
pub mod share;
pub mod stats;

/// Lessonloom AI backend CLI
#[derive(Parser, Debug)]
#[command(name = "lessonloom")]
#[command(about = "Multi-provider AI routing for lesson-plan generation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configured backends
    Backends {
        #[command(subcommand)]
        action: backends::BackendsCommand,
    },
    /// Generate content through the router
    Generate(generate::GenerateArgs),
    /// Show usage statistics
    Stats {
        /// Reset all statistics
        #[arg(long)]
        clear: bool,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Share backends as an encrypted bundle
    Share {
        #[command(subcommand)]
        action: share::ShareCommand,
    },
    /// Add backends for provider API keys found in the environment
    Seed,
}

/// Everything a command needs, built once per invocation
pub struct AppContext {
    pub router: Router,
    pub shares: ShareService,
}

impl AppContext {
    /// Open persisted router state and the share store under the data dir
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let state_dir = config.state_dir()?;
        let shares_dir = config.shares_dir()?;
        debug!(state = %state_dir.display(), shares = %shares_dir.display(), "Opening data directories");

        let router = Router::load_with_defaults(
            Arc::new(HttpBackendFactory),
            Arc::new(FileKvStore::new(state_dir)),
            config.router.settings(),
        )
        .await
        .context("Failed to load router state")?;
        let shares = ShareService::new(Arc::new(FileBlobStore::new(shares_dir)));

        Ok(Self { router, shares })
    }
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    // Passphrase scoring needs no state
    if let Commands::Share {
        action: share::ShareCommand::CheckPassphrase,
    } = &command
    {
        return share::check_passphrase();
    }

    let ctx = AppContext::open(&config).await?;
    match command {
        Commands::Backends { action } => backends::run(&ctx, action).await,
        Commands::Generate(args) => generate::run(&ctx, args).await,
        Commands::Stats { clear, json } => stats::run(&ctx, clear, json).await,
        Commands::Share { action } => share::run(&ctx, action).await,
        Commands::Seed => seed::run(&ctx).await,
    }
}
