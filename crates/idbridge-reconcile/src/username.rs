//! Usernames for accounts that have no directory identity.

use idbridge_matching::SimilarityEngine;
use std::collections::HashSet;

const FALLBACK_USERNAME: &str = "user";

/// First initial plus last name token, ASCII alphanumerics only, lowercased.
///
/// `("María José", "López Díaz")` becomes `mdiaz`; a single-token name is
/// used whole.
#[must_use]
pub fn base_username(given_name: &str, surname: &str) -> String {
    let full = SimilarityEngine::normalize(&format!("{given_name} {surname}"));
    let tokens: Vec<String> = full
        .split_whitespace()
        .map(|token| token.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|token| !token.is_empty())
        .collect();

    let base = match tokens.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, .., last] => {
            let mut base: String = first.chars().take(1).collect();
            base.push_str(last);
            base
        }
    };

    if base.is_empty() {
        FALLBACK_USERNAME.to_string()
    } else {
        base
    }
}

/// `base`, or `base` suffixed with 2, 3, ... until it is not in `taken`.
///
/// `taken` holds lowercased usernames.
#[must_use]
pub fn unique_username(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_and_last_token() {
        assert_eq!(base_username("Maria", "Lopez"), "mlopez");
        assert_eq!(base_username("Juan", "Carlos Perez"), "jperez");
    }

    #[test]
    fn test_diacritics_and_punctuation_removed() {
        assert_eq!(base_username("María José", "López Díaz"), "mdiaz");
        assert_eq!(base_username("Seán", "O'Brien"), "sobrien");
    }

    #[test]
    fn test_single_token_and_empty() {
        assert_eq!(base_username("Cher", ""), "cher");
        assert_eq!(base_username("", ""), "user");
        assert_eq!(base_username("!!", "??"), "user");
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(unique_username("mlopez", &taken), "mlopez");

        taken.insert("mlopez".to_string());
        assert_eq!(unique_username("mlopez", &taken), "mlopez2");

        taken.insert("mlopez2".to_string());
        assert_eq!(unique_username("mlopez", &taken), "mlopez3");
    }
}
