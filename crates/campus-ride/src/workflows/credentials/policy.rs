use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const DEFAULT_SPECIAL_CHARACTERS: &str = "@#%!&*$";

/// One password complexity requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    SpecialCharacter,
}

impl PasswordRule {
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::MinLength,
        PasswordRule::Uppercase,
        PasswordRule::Lowercase,
        PasswordRule::Digit,
        PasswordRule::SpecialCharacter,
    ];

    /// Checklist text shown under a password field.
    pub const fn label(self) -> &'static str {
        match self {
            PasswordRule::MinLength => "At least 8 characters long",
            PasswordRule::Uppercase => "At least one uppercase letter",
            PasswordRule::Lowercase => "At least one lowercase letter",
            PasswordRule::Digit => "At least one number",
            PasswordRule::SpecialCharacter => "At least one special character",
        }
    }
}

/// Rules evaluated for one password value and the ones it fails, in checklist order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordPolicyResult {
    pub rules: BTreeSet<PasswordRule>,
    pub unmet: Vec<PasswordRule>,
}

impl PasswordPolicyResult {
    pub fn is_satisfied(&self) -> bool {
        self.unmet.is_empty()
    }

    pub fn is_met(&self, rule: PasswordRule) -> bool {
        self.rules.contains(&rule) && !self.unmet.contains(&rule)
    }

    pub fn summary(&self) -> String {
        if self.unmet.is_empty() {
            return "password meets every requirement".to_string();
        }
        let missing: Vec<&str> = self.unmet.iter().map(|rule| rule.label()).collect();
        format!("password is missing: {}", missing.join("; "))
    }
}

/// Pure password complexity check shared by every credential screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    special_characters: Vec<char>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::with_special_characters(DEFAULT_SPECIAL_CHARACTERS)
    }
}

impl PasswordPolicy {
    pub fn with_special_characters(set: &str) -> Self {
        let mut special_characters: Vec<char> =
            set.chars().filter(|ch| !ch.is_whitespace()).collect();
        special_characters.sort_unstable();
        special_characters.dedup();
        Self { special_characters }
    }

    pub fn special_characters(&self) -> String {
        self.special_characters.iter().collect()
    }

    /// Evaluate every rule against `password`. Total over all input, including the empty string.
    pub fn evaluate(&self, password: &str) -> PasswordPolicyResult {
        let unmet = PasswordRule::ALL
            .into_iter()
            .filter(|rule| !self.satisfies(*rule, password))
            .collect();

        PasswordPolicyResult {
            rules: PasswordRule::ALL.into_iter().collect(),
            unmet,
        }
    }

    fn satisfies(&self, rule: PasswordRule, password: &str) -> bool {
        match rule {
            PasswordRule::MinLength => password.chars().count() >= MIN_PASSWORD_CHARS,
            PasswordRule::Uppercase => password.chars().any(|ch| ch.is_ascii_uppercase()),
            PasswordRule::Lowercase => password.chars().any(|ch| ch.is_ascii_lowercase()),
            PasswordRule::Digit => password.chars().any(|ch| ch.is_ascii_digit()),
            PasswordRule::SpecialCharacter => password
                .chars()
                .any(|ch| self.special_characters.binary_search(&ch).is_ok()),
        }
    }
}

/// Whether the re-typed password matches. Not a [`PasswordRule`]; it never appears in `unmet`.
pub fn confirmation_matches(password: &str, confirmation: &str) -> bool {
    password == confirmation
}
