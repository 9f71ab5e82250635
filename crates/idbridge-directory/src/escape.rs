//! LDAP value escaping.
//!
//! User input is never interpolated into a filter or DN unescaped.

/// Escape special characters in LDAP filter values (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escape special characters in DN attribute values (RFC 4514).
///
/// Characters that must be escaped:
/// - Leading or trailing SPACE (as `\20`)
/// - Leading `#` (as `\23`)
/// - `, + " \ < > ; =` (with a backslash prefix)
/// - NUL (as `\00`)
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\0' => escaped.push_str("\\00"),
            ' ' if i == 0 || i == last => escaped.push_str("\\20"),
            '#' if i == 0 => escaped.push_str("\\23"),
            _ => escaped.push(ch),
        }
    }

    escaped
}

/// Equality filter for one user, AND-ed with the person filter.
#[must_use]
pub fn user_filter(person_filter: &str, attribute: &str, username: &str) -> String {
    format!(
        "(&{}({}={}))",
        person_filter,
        attribute,
        escape_filter_value(username)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_escaping() {
        assert_eq!(escape_filter_value("john*"), "john\\2a");
        assert_eq!(escape_filter_value("a(b)c"), "a\\28b\\29c");
        assert_eq!(escape_filter_value("back\\slash"), "back\\5cslash");
        assert_eq!(escape_filter_value("nul\0"), "nul\\00");
        assert_eq!(escape_filter_value("José"), "José");
    }

    #[test]
    fn test_filter_injection_is_neutralized() {
        let filter = user_filter("(objectClass=user)", "sAMAccountName", "*)(uid=*");
        assert_eq!(
            filter,
            "(&(objectClass=user)(sAMAccountName=\\2a\\29\\28uid=\\2a))"
        );
    }

    #[test]
    fn test_dn_escaping() {
        assert_eq!(escape_dn_value("Smith, John"), "Smith\\, John");
        assert_eq!(escape_dn_value(" lead"), "\\20lead");
        assert_eq!(escape_dn_value("trail "), "trail\\20");
        assert_eq!(escape_dn_value("#hash"), "\\23hash");
        assert_eq!(escape_dn_value("a=b+c"), "a\\=b\\+c");
        assert_eq!(escape_dn_value(""), "");
    }

    #[test]
    fn test_dn_escaping_counts_characters_not_bytes() {
        assert_eq!(escape_dn_value("Pérez "), "Pérez\\20");
    }
}
