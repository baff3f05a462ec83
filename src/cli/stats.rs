//! CLI command: `lessonloom stats`

use super::AppContext;
use anyhow::Result;

/// Run the stats subcommand.
pub async fn run(ctx: &AppContext, clear: bool, json: bool) -> Result<()> {
    if clear {
        ctx.router.clear_usage_stats().await?;
        println!("  Usage statistics cleared");
        return Ok(());
    }

    let stats = ctx.router.usage_stats().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let configs = ctx.router.list_backends().await;
    println!();
    println!(
        "  {:<20} {:>9} {:>9} {:>12} {:>10}  Last used",
        "Backend", "Requests", "Success", "Avg latency", "Tokens"
    );
    println!("  {}", "-".repeat(88));
    if stats.is_empty() {
        println!("  (no calls recorded yet)");
    }
    for stat in &stats {
        let name = configs
            .iter()
            .find(|c| c.id == stat.backend_id)
            .map(|c| c.name.as_str())
            .unwrap_or(stat.backend_id.as_str());
        let last_used = stat
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:>9} {:>8.1}% {:>9.0} ms {:>10}  {}",
            name,
            stat.total_requests,
            stat.success_rate() * 100.0,
            stat.average_latency_ms,
            stat.total_tokens,
            last_used
        );
    }
    println!();
    Ok(())
}
