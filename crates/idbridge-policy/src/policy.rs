//! Password policy configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Special characters that satisfy the special-character class.
pub const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`'\"\\";

/// Invalid policy configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid password policy: {message}")]
pub struct InvalidPolicy {
    pub message: String,
}

/// Rules a candidate password is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_true")]
    pub require_uppercase: bool,
    #[serde(default = "default_true")]
    pub require_lowercase: bool,
    #[serde(default = "default_true")]
    pub require_digit: bool,
    #[serde(default)]
    pub require_special: bool,
    /// Longest allowed run of one repeated character.
    #[serde(default = "default_max_repeated_chars")]
    pub max_repeated_chars: usize,
    /// Length of a keyboard or alphabet run that counts as a sequence.
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    /// Passwords scoring below this are rejected as too weak.
    #[serde(default = "default_min_strength_score")]
    pub min_strength_score: u8,
}

fn default_min_length() -> usize {
    8
}

fn default_max_length() -> usize {
    128
}

fn default_true() -> bool {
    true
}

fn default_max_repeated_chars() -> usize {
    3
}

fn default_sequence_length() -> usize {
    4
}

fn default_min_strength_score() -> u8 {
    30
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
            max_repeated_chars: default_max_repeated_chars(),
            sequence_length: default_sequence_length(),
            min_strength_score: default_min_strength_score(),
        }
    }
}

impl PasswordPolicy {
    /// Check that the policy is internally consistent.
    pub fn validate(&self) -> Result<(), InvalidPolicy> {
        let fail = |message: &str| {
            Err(InvalidPolicy {
                message: message.to_string(),
            })
        };

        if self.min_length == 0 {
            return fail("min_length must be at least 1");
        }
        if self.max_length < self.min_length {
            return fail("max_length must not be smaller than min_length");
        }
        if self.max_repeated_chars == 0 {
            return fail("max_repeated_chars must be at least 1");
        }
        if self.sequence_length < 3 {
            return fail("sequence_length must be at least 3");
        }
        if self.min_strength_score > 100 {
            return fail("min_strength_score must be between 0 and 100");
        }
        Ok(())
    }

    /// Number of character classes the policy requires.
    #[must_use]
    pub fn required_classes(&self) -> usize {
        [
            self.require_uppercase,
            self.require_lowercase,
            self.require_digit,
            self.require_special,
        ]
        .into_iter()
        .filter(|required| *required)
        .count()
    }
}
