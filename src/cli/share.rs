//! CLI command: `lessonloom share`
//!
//! The passphrase comes from `LESSONLOOM_SHARE_PASSPHRASE` or a masked
//! prompt; it is never accepted as a command-line argument.

use super::{secret, AppContext};
use anyhow::{bail, Result};
use clap::Subcommand;
use lessonloom_share::{password_strength, SharePreview};

#[derive(Subcommand, Debug)]
pub enum ShareCommand {
    /// Encrypt backends into a new share
    Create {
        /// Backend ids to include
        #[arg(long = "backend", required = true, num_args = 1..)]
        backends: Vec<String>,
        /// Name shown to recipients
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Decrypt a share, optionally adding its backends
    Load {
        id: String,
        /// Add the shared backends to this installation
        #[arg(long)]
        import: bool,
    },
    /// Show share metadata without the passphrase
    Preview { id: String },
    /// Score a passphrase
    CheckPassphrase,
}

/// Run the share subcommand.
pub async fn run(ctx: &AppContext, command: ShareCommand) -> Result<()> {
    match command {
        ShareCommand::Create {
            backends,
            name,
            description,
        } => {
            let mut configs = Vec::with_capacity(backends.len());
            for id in &backends {
                match ctx.router.get_backend(id).await {
                    Some(config) => configs.push(config),
                    None => bail!("backend not found: {}", id),
                }
            }
            let passphrase = secret::passphrase(true)?;
            let id = ctx
                .shares
                .create_share(&configs, &name, &passphrase, description)
                .await?;
            println!("  Share id: {}", id);
            println!("  Send the passphrase to the recipient through a separate channel.");
            Ok(())
        }
        ShareCommand::Preview { id } => {
            print_preview(&ctx.shares.preview_share(&id).await?);
            Ok(())
        }
        ShareCommand::Load { id, import } => {
            let passphrase = secret::passphrase(false)?;
            if import {
                let imported = ctx
                    .shares
                    .import_share(&ctx.router, &id, &passphrase)
                    .await?;
                for config in &imported {
                    println!("  Imported {} ({})", config.name, config.id);
                }
                println!("  {} backend(s) imported", imported.len());
                return Ok(());
            }

            let data = ctx.shares.load_share(&id, &passphrase).await?;
            println!("  Shared at {}", data.shared_at.format("%Y-%m-%d %H:%M"));
            for backend in &data.backends {
                println!(
                    "  {:<20} {:<11} {:<28} {}",
                    backend.name,
                    backend.kind,
                    backend.model,
                    backend.credential.masked()
                );
            }
            Ok(())
        }
        ShareCommand::CheckPassphrase => check_passphrase(),
    }
}

/// Score the passphrase without touching any state
pub fn check_passphrase() -> Result<()> {
    let passphrase = secret::passphrase(false)?;
    let strength = password_strength(&passphrase);
    println!(
        "  Score {}/5 ({})",
        strength.score,
        if strength.valid { "strong enough" } else { "too weak" }
    );
    for hint in &strength.feedback {
        println!("  - {}", hint);
    }
    Ok(())
}

fn print_preview(preview: &SharePreview) {
    let kinds: Vec<String> = preview
        .metadata
        .backend_kinds
        .iter()
        .map(|k| k.display_name().to_string())
        .collect();
    println!();
    println!("  {}", preview.name);
    if let Some(description) = &preview.description {
        println!("  {}", description);
    }
    println!("  {}", "-".repeat(40));
    println!("  Backends:  {}", preview.metadata.backend_count);
    println!("  Providers: {}", kinds.join(", "));
    println!(
        "  Created:   {}",
        preview.metadata.created_at.format("%Y-%m-%d %H:%M")
    );
    println!();
}
