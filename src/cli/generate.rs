//! CLI command: `lessonloom generate`

use super::AppContext;
use anyhow::{bail, Result};
use clap::Args;
use lessonloom_llm::{GenerateRequest, GenerateResult, SelectionPolicy};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Prompt text
    #[arg(long, short)]
    pub prompt: String,
    /// Selection policy: default, fastest, fallback, load-balance
    #[arg(long, default_value_t = SelectionPolicy::Default)]
    pub policy: SelectionPolicy,
    /// Ask for a JSON response
    #[arg(long)]
    pub json: bool,
    /// Model override
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

impl GenerateArgs {
    fn request(&self) -> GenerateRequest {
        let mut request = GenerateRequest::new(self.prompt.clone());
        if self.json {
            request = request.json();
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

/// Run the generate subcommand.
pub async fn run(ctx: &AppContext, args: GenerateArgs) -> Result<()> {
    let request = args.request();
    match ctx.router.generate_content(&request, args.policy).await {
        GenerateResult::Success(success) => {
            match &success.content {
                serde_json::Value::String(text) => println!("{}", text),
                value => println!("{}", serde_json::to_string_pretty(value)?),
            }
            if let Some(usage) = success.usage {
                eprintln!(
                    "  [{} | {} tokens]",
                    success.model, usage.total_tokens
                );
            }
            Ok(())
        }
        GenerateResult::Failure(failure) => {
            bail!("{} ({})", failure.message, failure.error_kind)
        }
    }
}
