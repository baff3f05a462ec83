//! Secret input: environment first, then a masked prompt

use anyhow::{Context, Result};
use inquire::{Password, PasswordDisplayMode};
use lessonloom_llm::{BackendKind, SecureString};
use zeroize::Zeroizing;

/// Environment variable consulted before prompting for a share passphrase
pub const PASSPHRASE_ENV: &str = "LESSONLOOM_SHARE_PASSPHRASE";

/// Read the share passphrase; `confirm` asks twice when prompting
pub fn passphrase(confirm: bool) -> Result<Zeroizing<String>> {
    if let Some(value) = std::env::var(PASSPHRASE_ENV).ok().filter(|v| !v.is_empty()) {
        return Ok(Zeroizing::new(value));
    }

    let mut prompt = Password::new("Share passphrase:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_validator(inquire::required!())
        .with_help_message("Send it to the recipient separately from the share id");
    if !confirm {
        prompt = prompt.without_confirmation();
    }
    let value = prompt.prompt().context("Failed to read passphrase")?;
    Ok(Zeroizing::new(value))
}

/// Read an API key for `kind`, from its provider variable when `from_env`
pub fn api_key(kind: BackendKind, from_env: bool) -> Result<SecureString> {
    if from_env {
        let var = kind.api_key_env();
        let value = std::env::var(var).with_context(|| format!("{} is not set", var))?;
        return Ok(SecureString::new(value));
    }

    let value = Password::new(&format!("Enter {} API key:", kind.display_name()))
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_validator(inquire::required!())
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    Ok(SecureString::new(value))
}
