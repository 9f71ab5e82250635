//! Password validation and strength scoring.

use serde::{Deserialize, Serialize};
use tracing::debug;

use idbridge_core::OwnerHints;
use idbridge_matching::SimilarityEngine;

use crate::policy::{PasswordPolicy, SPECIAL_CHARS};

/// Substrings of the most common leaked passwords.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "passw0rd", "123456", "qwerty", "letmein", "welcome", "iloveyou", "admin",
    "abc123", "monkey", "dragon", "master", "111111", "changeme", "secret", "sunshine",
    "football", "baseball", "trustno1", "login",
];

/// Keyboard rows and the alphabet; any run of them, forward or reversed, counts.
const KEYBOARD_SEQUENCES: &[&str] = &[
    "qwertyuiop",
    "asdfghjkl",
    "zxcvbnm",
    "1234567890",
    "abcdefghijklmnopqrstuvwxyz",
];

const COMMON_PASSWORD_PENALTY: i32 = 30;
const PERSONAL_INFO_PENALTY: i32 = 25;
const REPEATED_RUN_PENALTY: i32 = 15;
const SEQUENCE_PENALTY: i32 = 15;

/// A rule the candidate password breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PolicyViolation {
    TooShort { min: usize, actual: usize },
    TooLong { max: usize, actual: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecialChar,
    /// Contains a well-known leaked password.
    CommonPassword,
    /// Contains the owner's username, name or email.
    ContainsPersonalInfo { field: String },
    /// A single character repeats more than `max` times in a row.
    RepeatedCharacters { max: usize },
    /// Contains a keyboard row or alphabet run.
    KeyboardSequence,
    TooWeak { score: u8, required: u8 },
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { min, actual } => {
                write!(f, "Password must be at least {min} characters (got {actual})")
            }
            Self::TooLong { max, actual } => {
                write!(f, "Password must be at most {max} characters (got {actual})")
            }
            Self::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            Self::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter")
            }
            Self::MissingDigit => write!(f, "Password must contain at least one digit"),
            Self::MissingSpecialChar => {
                write!(f, "Password must contain at least one special character")
            }
            Self::CommonPassword => write!(f, "Password contains a commonly used password"),
            Self::ContainsPersonalInfo { field } => {
                write!(f, "Password must not contain your {field}")
            }
            Self::RepeatedCharacters { max } => {
                write!(
                    f,
                    "Password must not repeat a character more than {max} times in a row"
                )
            }
            Self::KeyboardSequence => {
                write!(f, "Password must not contain keyboard or alphabet sequences")
            }
            Self::TooWeak { score, required } => {
                write!(f, "Password is too weak (strength {score}, need {required})")
            }
        }
    }
}

/// Strength bucket derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLabel {
    Weak,
    Fair,
    Good,
    Strong,
}

impl StrengthLabel {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => Self::Weak,
            30..=49 => Self::Fair,
            50..=79 => Self::Good,
            _ => Self::Strong,
        }
    }
}

impl std::fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Weak => "weak",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Strong => "strong",
        };
        f.write_str(label)
    }
}

/// Result of evaluating a candidate password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub is_valid: bool,
    pub violations: Vec<PolicyViolation>,
    pub strength_score: u8,
    pub strength_label: StrengthLabel,
}

impl PolicyEvaluation {
    /// All violation messages joined into one string.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[must_use]
    pub fn has_violation(&self, predicate: impl Fn(&PolicyViolation) -> bool) -> bool {
        self.violations.iter().any(predicate)
    }
}

/// Validates and scores candidate passwords.
#[derive(Debug, Clone, Default)]
pub struct PasswordPolicyEngine {
    policy: PasswordPolicy,
}

impl PasswordPolicyEngine {
    #[must_use]
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Evaluate against the engine's policy.
    #[must_use]
    pub fn validate(&self, secret: &str, hints: &OwnerHints) -> PolicyEvaluation {
        Self::evaluate(secret, hints, &self.policy)
    }

    /// Evaluate a password against an explicit policy.
    ///
    /// The score starts from length and character-class points, adds a
    /// diversity bonus, then subtracts penalties for common passwords, personal
    /// data, repeated runs and keyboard sequences. Every penalty is also a
    /// violation.
    #[must_use]
    pub fn evaluate(secret: &str, hints: &OwnerHints, policy: &PasswordPolicy) -> PolicyEvaluation {
        let mut violations = Vec::new();
        let mut score: i32 = 0;
        let length = secret.chars().count();

        if length < policy.min_length {
            violations.push(PolicyViolation::TooShort {
                min: policy.min_length,
                actual: length,
            });
        } else {
            let extra = (length - policy.min_length).min(10) as i32;
            score += 10 + extra * 3;
        }
        if length > policy.max_length {
            violations.push(PolicyViolation::TooLong {
                max: policy.max_length,
                actual: length,
            });
        }

        let classes = [
            (
                secret.chars().any(char::is_uppercase),
                policy.require_uppercase,
                PolicyViolation::MissingUppercase,
            ),
            (
                secret.chars().any(char::is_lowercase),
                policy.require_lowercase,
                PolicyViolation::MissingLowercase,
            ),
            (
                secret.chars().any(|c| c.is_ascii_digit()),
                policy.require_digit,
                PolicyViolation::MissingDigit,
            ),
            (
                secret.chars().any(|c| SPECIAL_CHARS.contains(c)),
                policy.require_special,
                PolicyViolation::MissingSpecialChar,
            ),
        ];
        for (present, required, violation) in classes {
            if present {
                score += 10;
            } else if required {
                violations.push(violation);
            }
        }

        score += diversity_bonus(secret);

        let lowered = secret.to_lowercase();

        if COMMON_PASSWORDS.iter().any(|common| lowered.contains(common)) {
            violations.push(PolicyViolation::CommonPassword);
            score -= COMMON_PASSWORD_PENALTY;
        }

        let personal = personal_info_fields(secret, hints);
        if !personal.is_empty() {
            score -= PERSONAL_INFO_PENALTY;
            violations.extend(
                personal
                    .into_iter()
                    .map(|field| PolicyViolation::ContainsPersonalInfo {
                        field: field.to_string(),
                    }),
            );
        }

        if longest_run(secret) > policy.max_repeated_chars {
            violations.push(PolicyViolation::RepeatedCharacters {
                max: policy.max_repeated_chars,
            });
            score -= REPEATED_RUN_PENALTY;
        }

        if contains_sequence(&lowered, policy.sequence_length) {
            violations.push(PolicyViolation::KeyboardSequence);
            score -= SEQUENCE_PENALTY;
        }

        let strength_score = score.clamp(0, 100) as u8;
        if strength_score < policy.min_strength_score {
            violations.push(PolicyViolation::TooWeak {
                score: strength_score,
                required: policy.min_strength_score,
            });
        }

        let strength_label = StrengthLabel::from_score(strength_score);
        debug!(
            strength_score,
            %strength_label,
            violations = violations.len(),
            "Password evaluated"
        );

        PolicyEvaluation {
            is_valid: violations.is_empty(),
            violations,
            strength_score,
            strength_label,
        }
    }

    /// Improvement tips, most important first.
    ///
    /// Opens with a general tip for the strength bucket, followed by one tip
    /// per distinct kind of violation.
    #[must_use]
    pub fn suggest(&self, evaluation: &PolicyEvaluation) -> Vec<String> {
        let mut tips: Vec<String> = Vec::new();

        let general = match evaluation.strength_label {
            StrengthLabel::Weak => Some("Use a longer passphrase made of several unrelated words"),
            StrengthLabel::Fair => Some("Add more characters to strengthen the password"),
            StrengthLabel::Good => Some("Add a symbol or a few more characters for a strong password"),
            StrengthLabel::Strong => None,
        };
        if let Some(tip) = general {
            tips.push(tip.to_string());
        }

        for violation in &evaluation.violations {
            let tip = match violation {
                PolicyViolation::TooShort { min, .. } => {
                    format!("Use at least {min} characters")
                }
                PolicyViolation::TooLong { max, .. } => format!("Use at most {max} characters"),
                PolicyViolation::MissingUppercase
                | PolicyViolation::MissingLowercase
                | PolicyViolation::MissingDigit
                | PolicyViolation::MissingSpecialChar => {
                    "Mix uppercase and lowercase letters, digits and symbols".to_string()
                }
                PolicyViolation::CommonPassword => {
                    "Avoid common passwords and dictionary words".to_string()
                }
                PolicyViolation::ContainsPersonalInfo { .. } => {
                    "Do not include your name, username or email address".to_string()
                }
                PolicyViolation::RepeatedCharacters { .. } => {
                    "Avoid repeating the same character".to_string()
                }
                PolicyViolation::KeyboardSequence => {
                    "Avoid keyboard patterns such as qwerty or 1234".to_string()
                }
                PolicyViolation::TooWeak { .. } => continue,
            };
            if !tips.contains(&tip) {
                tips.push(tip);
            }
        }

        tips
    }
}

/// Up to 20 points for the share of distinct characters.
fn diversity_bonus(secret: &str) -> i32 {
    let total = secret.chars().count();
    if total == 0 {
        return 0;
    }
    let mut distinct: Vec<char> = secret.chars().collect();
    distinct.sort_unstable();
    distinct.dedup();
    (distinct.len() as f64 / total as f64 * 20.0).round() as i32
}

fn longest_run(secret: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in secret.chars() {
        if Some(c) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

fn contains_sequence(lowered: &str, window: usize) -> bool {
    KEYBOARD_SEQUENCES.iter().any(|row| {
        let forward: Vec<char> = row.chars().collect();
        let reversed: Vec<char> = forward.iter().rev().copied().collect();
        [forward, reversed].iter().any(|chars| {
            chars.windows(window).any(|run| {
                let run: String = run.iter().collect();
                lowered.contains(&run)
            })
        })
    })
}

/// Labels of the owner hints the password contains.
fn personal_info_fields(secret: &str, hints: &OwnerHints) -> Vec<&'static str> {
    let compact = |value: &str| SimilarityEngine::normalize(value).replace(' ', "");
    let password = compact(secret);

    hints
        .labelled()
        .into_iter()
        .filter_map(|(label, value)| {
            let hint = compact(value);
            (hint.chars().count() > 2 && password.contains(&hint)).then_some(label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PasswordPolicyEngine {
        PasswordPolicyEngine::default()
    }

    #[test]
    fn test_username_in_password_is_personal_info() {
        let result = engine().validate("Pass1234", &OwnerHints::for_username("pass1234"));
        assert!(!result.is_valid);
        assert!(result.violations.contains(&PolicyViolation::ContainsPersonalInfo {
            field: "username".to_string()
        }));
    }

    #[test]
    fn test_personal_info_ignores_case_and_accents() {
        let hints = OwnerHints {
            surname: Some("López".to_string()),
            ..OwnerHints::default()
        };
        let result = engine().validate("xLOPEZ-91q!", &hints);
        assert!(result.has_violation(|v| matches!(
            v,
            PolicyViolation::ContainsPersonalInfo { field } if field == "surname"
        )));
    }

    #[test]
    fn test_short_hints_are_ignored() {
        let hints = OwnerHints {
            given_name: Some("Al".to_string()),
            ..OwnerHints::default()
        };
        let result = engine().validate("Tr0ub4dor&Al-x", &hints);
        assert!(!result.has_violation(|v| matches!(v, PolicyViolation::ContainsPersonalInfo { .. })));
    }

    #[test]
    fn test_strong_password_passes() {
        let result = engine().validate("N3w-Secure!Pass", &OwnerHints::for_username("mlopez"));
        assert!(result.is_valid, "violations: {}", result.error_message());
        assert_eq!(result.strength_label, StrengthLabel::Strong);
        assert!(engine().suggest(&result).is_empty());
    }

    #[test]
    fn test_length_and_class_violations() {
        let result = engine().validate("aaa", &OwnerHints::default());
        assert!(result.violations.contains(&PolicyViolation::TooShort { min: 8, actual: 3 }));
        assert!(result.violations.contains(&PolicyViolation::MissingUppercase));
        assert!(result.violations.contains(&PolicyViolation::MissingDigit));
        assert_eq!(result.strength_label, StrengthLabel::Weak);
    }

    #[test]
    fn test_common_password_penalized() {
        let result = engine().validate("MyPassword77", &OwnerHints::default());
        assert!(result.violations.contains(&PolicyViolation::CommonPassword));
    }

    #[test]
    fn test_repeated_characters() {
        let result = engine().validate("Gooood-Tim3!", &OwnerHints::default());
        assert!(result
            .violations
            .contains(&PolicyViolation::RepeatedCharacters { max: 3 }));

        let ok = engine().validate("Good-Tim3!x", &OwnerHints::default());
        assert!(!ok.has_violation(|v| matches!(v, PolicyViolation::RepeatedCharacters { .. })));
    }

    #[test]
    fn test_keyboard_sequence_forward_and_reversed() {
        let forward = engine().validate("Zz9!asdfXy", &OwnerHints::default());
        assert!(forward.violations.contains(&PolicyViolation::KeyboardSequence));

        let reversed = engine().validate("Zz!9876Xyq", &OwnerHints::default());
        assert!(reversed.violations.contains(&PolicyViolation::KeyboardSequence));
    }

    #[test]
    fn test_score_clamped_to_zero() {
        let result = engine().validate("password", &OwnerHints::for_username("password"));
        assert_eq!(result.strength_score, 0);
        assert_eq!(result.strength_label, StrengthLabel::Weak);
    }

    #[test]
    fn test_labels_follow_score_bands() {
        assert_eq!(StrengthLabel::from_score(29), StrengthLabel::Weak);
        assert_eq!(StrengthLabel::from_score(30), StrengthLabel::Fair);
        assert_eq!(StrengthLabel::from_score(49), StrengthLabel::Fair);
        assert_eq!(StrengthLabel::from_score(50), StrengthLabel::Good);
        assert_eq!(StrengthLabel::from_score(80), StrengthLabel::Strong);
    }

    #[test]
    fn test_suggestions_start_with_label_tip_and_dedupe() {
        let result = engine().validate("aaa", &OwnerHints::default());
        let tips = engine().suggest(&result);
        assert_eq!(tips[0], "Use a longer passphrase made of several unrelated words");
        assert_eq!(
            tips.iter()
                .filter(|t| t.starts_with("Mix uppercase"))
                .count(),
            1
        );
    }

    #[test]
    fn test_violations_serialize_with_code() {
        let json = serde_json::to_value(PolicyViolation::ContainsPersonalInfo {
            field: "email".to_string(),
        })
        .unwrap();
        assert_eq!(json["code"], "contains_personal_info");
        assert_eq!(json["field"], "email");
    }
}
