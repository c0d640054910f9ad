use serde::Deserialize;

use super::policy::{confirmation_matches, PasswordPolicy, PasswordRule};

/// Fields of a password reset or change form.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct PasswordChangeRequest {
    pub username: String,
    pub password: String,
    pub confirmation: String,
}

impl std::fmt::Debug for PasswordChangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChangeRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("confirmation", &"<redacted>")
            .finish()
    }
}

impl PasswordChangeRequest {
    /// First failing check, in form order: username, confirmation, then complexity.
    pub fn validate(&self, policy: &PasswordPolicy) -> Result<(), PasswordChangeError> {
        if self.username.trim().is_empty() {
            return Err(PasswordChangeError::MissingUsername);
        }
        if !confirmation_matches(&self.password, &self.confirmation) {
            return Err(PasswordChangeError::ConfirmationMismatch);
        }
        let result = policy.evaluate(&self.password);
        if result.is_satisfied() {
            Ok(())
        } else {
            Err(PasswordChangeError::UnmetRules(result.unmet))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordChangeError {
    #[error("Please enter a username.")]
    MissingUsername,
    #[error("Passwords do not match. Please re-enter your new password.")]
    ConfirmationMismatch,
    #[error("Please meet all password requirements: {}", describe(.0))]
    UnmetRules(Vec<PasswordRule>),
}

fn describe(rules: &[PasswordRule]) -> String {
    rules
        .iter()
        .map(|rule| rule.label())
        .collect::<Vec<_>>()
        .join("; ")
}
