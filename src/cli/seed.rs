//! CLI command: `lessonloom seed`

use super::AppContext;
use anyhow::Result;
use lessonloom_llm::BackendKind;

/// Run the seed subcommand.
pub async fn run(ctx: &AppContext) -> Result<()> {
    let added = ctx.router.seed_from_env().await?;
    if added.is_empty() {
        let vars: Vec<_> = BackendKind::ALL.iter().map(|k| k.api_key_env()).collect();
        println!("  Nothing to seed (looked for {})", vars.join(", "));
    }
    for config in &added {
        println!(
            "  Added {} ({}) with key {}",
            config.name,
            config.id,
            config.credential.masked()
        );
    }
    Ok(())
}
