//! Passphrase strength scoring

use serde::Serialize;

/// Minimum score a passphrase needs to protect a share
pub const MIN_VALID_SCORE: u8 = 3;

/// Minimum length that earns the length point
pub const MIN_LENGTH: usize = 8;

/// Result of [`password_strength`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    /// 0..=5, one point per satisfied criterion
    pub score: u8,
    /// `score >= MIN_VALID_SCORE`
    pub valid: bool,
    /// One hint per missing criterion
    pub feedback: Vec<String>,
}

/// Score a candidate passphrase
#[must_use]
pub fn password_strength(candidate: &str) -> PasswordStrength {
    let checks = [
        (
            candidate.chars().count() >= MIN_LENGTH,
            "Use at least 8 characters",
        ),
        (
            candidate.chars().any(char::is_lowercase),
            "Add a lowercase letter",
        ),
        (
            candidate.chars().any(char::is_uppercase),
            "Add an uppercase letter",
        ),
        (
            candidate.chars().any(|c| c.is_ascii_digit()),
            "Add a digit",
        ),
        (
            candidate
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            "Add a special character",
        ),
    ];

    let mut score = 0u8;
    let mut feedback = Vec::new();
    for (passed, hint) in checks {
        if passed {
            score += 1;
        } else {
            feedback.push(hint.to_string());
        }
    }

    PasswordStrength {
        score,
        valid: score >= MIN_VALID_SCORE,
        feedback,
    }
}
