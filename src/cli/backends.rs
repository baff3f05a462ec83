//! CLI command: `lessonloom backends`

use super::{secret, AppContext};
use anyhow::Result;
use clap::Subcommand;
use lessonloom_llm::{BackendConfig, BackendKind, BackendUpdate, NewBackend, TestResult};

#[derive(Subcommand, Debug)]
pub enum BackendsCommand {
    /// List configured backends
    List {
        /// Print JSON (credentials masked)
        #[arg(long)]
        json: bool,
    },
    /// Add a backend; enabled backends are probed first
    Add {
        /// Provider: openai, anthropic, gemini, openrouter
        kind: BackendKind,
        /// Display name (provider name when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Model (provider default when omitted)
        #[arg(long)]
        model: Option<String>,
        /// Read the key from the provider's API-key variable instead of prompting
        #[arg(long)]
        from_env: bool,
        /// Store without enabling (skips the probe)
        #[arg(long)]
        disabled: bool,
    },
    /// Change a backend
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Prompt for a new API key
        #[arg(long)]
        rotate_key: bool,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Remove a backend and its statistics
    Remove { id: String },
    /// Make a backend the default
    Default { id: String },
    /// Probe one backend
    Test { id: String },
    /// Probe every backend
    TestAll,
    /// List models a backend offers
    Models { id: String },
}

/// Run the backends subcommand.
pub async fn run(ctx: &AppContext, command: BackendsCommand) -> Result<()> {
    let router = &ctx.router;
    match command {
        BackendsCommand::List { json } => list(ctx, json).await,
        BackendsCommand::Add {
            kind,
            name,
            model,
            from_env,
            disabled,
        } => {
            let credential = secret::api_key(kind, from_env)?;
            let mut new = NewBackend::new(
                name.unwrap_or_else(|| kind.display_name().to_string()),
                kind,
                credential,
            )
            .with_enabled(!disabled);
            if let Some(model) = model {
                new = new.with_model(model);
            }
            let config = router.add_backend(new).await?;
            println!("  Added {} ({})", config.name, config.id);
            Ok(())
        }
        BackendsCommand::Update {
            id,
            name,
            model,
            rotate_key,
            enable,
            disable,
        } => {
            let credential = if rotate_key {
                let kind = router
                    .get_backend(&id)
                    .await
                    .map(|c| c.kind)
                    .ok_or_else(|| anyhow::anyhow!("backend not found: {}", id))?;
                Some(secret::api_key(kind, false)?)
            } else {
                None
            };
            let enabled = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let update = BackendUpdate {
                name,
                credential,
                model,
                tuning: None,
                enabled,
            };
            let config = router.update_backend(&id, update).await?;
            println!("  Updated {} ({})", config.name, config.id);
            Ok(())
        }
        BackendsCommand::Remove { id } => {
            let config = router.remove_backend(&id).await?;
            println!("  Removed {} ({})", config.name, config.id);
            Ok(())
        }
        BackendsCommand::Default { id } => {
            router.set_default_backend(&id).await?;
            println!("  Default backend: {}", id);
            Ok(())
        }
        BackendsCommand::Test { id } => {
            let result = router.test_backend(&id).await?;
            print_test(&result, &router.list_backends().await);
            Ok(())
        }
        BackendsCommand::TestAll => {
            let configs = router.list_backends().await;
            let results = router.test_all_backends().await;
            if results.is_empty() {
                println!("  (no backends configured)");
            }
            for result in &results {
                print_test(result, &configs);
            }
            Ok(())
        }
        BackendsCommand::Models { id } => {
            for model in router.list_models(&id).await? {
                println!("  {}", model);
            }
            Ok(())
        }
    }
}

async fn list(ctx: &AppContext, json: bool) -> Result<()> {
    let configs = ctx.router.list_backends().await;
    let default_id = ctx.router.settings().await.default_backend_id;

    if json {
        let rows: Vec<serde_json::Value> = configs
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "name": c.name,
                    "kind": c.kind,
                    "model": c.model,
                    "enabled": c.enabled,
                    "credential": c.credential.masked(),
                    "default": default_id.as_deref() == Some(c.id.as_str()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("  {:<38} {:<20} {:<11} {:<28} {}", "ID", "Name", "Kind", "Model", "State");
    println!("  {}", "-".repeat(106));
    if configs.is_empty() {
        println!("  (no backends configured; try `lessonloom seed`)");
    }
    for c in &configs {
        let mut state = if c.enabled { "enabled" } else { "disabled" }.to_string();
        if default_id.as_deref() == Some(c.id.as_str()) {
            state.push_str(", default");
        }
        println!(
            "  {:<38} {:<20} {:<11} {:<28} {}",
            c.id, c.name, c.kind, c.model, state
        );
    }
    println!();
    Ok(())
}

fn print_test(result: &TestResult, configs: &[BackendConfig]) {
    let name = configs
        .iter()
        .find(|c| c.id == result.backend_id)
        .map(|c| c.name.as_str())
        .unwrap_or(result.backend_id.as_str());
    match &result.error {
        None => println!("  ok    {:<20} {} ms", name, result.latency_ms),
        Some(failure) => println!(
            "  FAIL  {:<20} {} ms  [{}] {}",
            name, result.latency_ms, failure.error_kind, failure.message
        ),
    }
}
