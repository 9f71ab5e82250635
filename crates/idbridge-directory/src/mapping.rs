//! Directory entry to [`DirectoryIdentity`] mapping.
//!
//! Attribute mapping:
//! - `sAMAccountName` / `uid` (the configured login attribute) -> username
//! - `mail` -> email
//! - `givenName` -> given_name
//! - `sn` -> surname
//! - `displayName`, falling back to `cn` -> display_name
//! - `department` -> department
//! - `physicalDeliveryOfficeName` -> office
//! - `title` -> title
//! - `memberOf` -> groups (CN of each group DN)

use idbridge_core::DirectoryIdentity;
use tracing::debug;

use crate::session::RawEntry;

/// Attributes requested from the directory.
pub const IDENTITY_ATTRIBUTES: &[&str] = &[
    "sAMAccountName",
    "uid",
    "mail",
    "givenName",
    "sn",
    "displayName",
    "cn",
    "department",
    "physicalDeliveryOfficeName",
    "title",
    "memberOf",
];

/// Map an entry. Entries without a username are skipped.
#[must_use]
pub fn map_entry(entry: &RawEntry, user_attribute: &str) -> Option<DirectoryIdentity> {
    let Some(username) = entry.first(user_attribute) else {
        debug!(dn = %entry.dn, "Skipping entry without username");
        return None;
    };

    let owned = |name: &str| entry.first(name).map(|v| v.trim().to_string());

    let groups = entry
        .values("memberOf")
        .map(|dns| dns.iter().filter_map(|dn| group_cn(dn)).collect())
        .unwrap_or_default();

    Some(DirectoryIdentity {
        username: username.trim().to_string(),
        dn: (!entry.dn.is_empty()).then(|| entry.dn.clone()),
        email: owned("mail"),
        given_name: owned("givenName"),
        surname: owned("sn"),
        display_name: owned("displayName").or_else(|| owned("cn")),
        department: owned("department"),
        office: owned("physicalDeliveryOfficeName"),
        title: owned("title"),
        groups,
    })
}

/// Map every entry, skipping unusable ones.
#[must_use]
pub fn map_entries(entries: &[RawEntry], user_attribute: &str) -> Vec<DirectoryIdentity> {
    entries
        .iter()
        .filter_map(|entry| map_entry(entry, user_attribute))
        .collect()
}

/// Common name of a group DN, e.g. `CN=Nurses,OU=Groups,DC=corp` -> `Nurses`.
///
/// Escaped commas inside the CN are kept.
fn group_cn(dn: &str) -> Option<String> {
    let mut rdn = String::new();
    let mut escaped = false;
    for ch in dn.chars() {
        if escaped {
            rdn.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            break;
        } else {
            rdn.push(ch);
        }
    }

    let (attr, value) = rdn.split_once('=')?;
    let value = value.trim();
    (attr.trim().eq_ignore_ascii_case("cn") && !value.is_empty()).then(|| value.to_string())
}
