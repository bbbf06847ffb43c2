//! Password policy for vault encryption
//!
//! One hard rule (minimum length) and a set of soft warnings. Warnings never
//! block a store; they are logged so the user can pick something better.

use std::collections::HashSet;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Length at which the short-password warning stops firing
const RECOMMENDED_LEN: usize = 12;

/// Passwords (or fragments) attackers try first
const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "12345678", "qwerty", "abc123", "letmein", "iloveyou", "trustno1",
    "solana", "phantom", "wallet", "crypto", "bitcoin", "moon", "lambo", "sniper",
];

/// Soft issues found in an otherwise acceptable password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordWarning {
    Short,
    Common,
    SingleCharacterClass,
    Repetitive,
}

impl PasswordWarning {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Short => "shorter than 12 characters",
            Self::Common => "contains a commonly used password or word",
            Self::SingleCharacterClass => "uses a single character class",
            Self::Repetitive => "too many repeated characters",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: MIN_PASSWORD_LEN,
        }
    }
}

impl PasswordPolicy {
    /// Policy with a custom minimum; never below [`MIN_PASSWORD_LEN`]
    pub fn with_min_len(min_len: usize) -> Self {
        Self {
            min_len: min_len.max(MIN_PASSWORD_LEN),
        }
    }

    /// Enforce the hard rule. The error message never echoes the password.
    pub fn check(&self, password: &str) -> Result<(), String> {
        let len = password.chars().count();
        if len < self.min_len {
            return Err(format!(
                "password must be at least {} characters",
                self.min_len
            ));
        }
        Ok(())
    }

    /// Collect soft warnings
    pub fn warnings(&self, password: &str) -> Vec<PasswordWarning> {
        let mut warnings = Vec::new();
        let len = password.chars().count();
        if len == 0 {
            return vec![PasswordWarning::Short];
        }

        if len < RECOMMENDED_LEN {
            warnings.push(PasswordWarning::Short);
        }

        let lower = password.to_lowercase();
        if COMMON_PASSWORDS.iter().any(|common| lower.contains(common)) {
            warnings.push(PasswordWarning::Common);
        }

        let classes = [
            password.chars().any(|c| c.is_ascii_lowercase()),
            password.chars().any(|c| c.is_ascii_uppercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
        ];
        if classes.iter().filter(|&&present| present).count() == 1 {
            warnings.push(PasswordWarning::SingleCharacterClass);
        }

        let unique: HashSet<char> = password.chars().collect();
        if unique.len() * 2 < len {
            warnings.push(PasswordWarning::Repetitive);
        }

        warnings
    }
}
