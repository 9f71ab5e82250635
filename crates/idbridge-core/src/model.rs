//! Identity records from the three systems being reconciled.
//!
//! - [`DirectoryIdentity`] comes live from the enterprise directory and is never persisted as-is.
//! - [`ErpPersonRecord`] is the authoritative roster of who should have access.
//! - [`LocalAccount`] is the application's system of record once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{AccountId, ErpPersonId};

/// Where a local account's credentials are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Credentials live in the enterprise directory; the username originates there.
    Directory,
    /// Credentials are verified against the locally stored secret hash.
    Local,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Directory => f.write_str("directory"),
            AuthMode::Local => f.write_str("local"),
        }
    }
}

/// A person as the enterprise directory describes them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryIdentity {
    /// Login name (`sAMAccountName` / `uid`).
    pub username: String,
    /// Distinguished name of the directory entry, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Group common names the identity is a member of.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl DirectoryIdentity {
    /// Create an identity with only a username set.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set given name and surname.
    #[must_use]
    pub fn with_names(mut self, given_name: impl Into<String>, surname: impl Into<String>) -> Self {
        self.given_name = Some(given_name.into());
        self.surname = Some(surname.into());
        self
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Best available full name: "given surname", then display name, then username.
    #[must_use]
    pub fn full_name(&self) -> String {
        let joined = [self.given_name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !joined.is_empty() {
            return joined;
        }

        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }
}

/// A person in the ERP personnel roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpPersonRecord {
    #[serde(alias = "id")]
    pub external_person_id: ErpPersonId,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<ErpPersonId>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl ErpPersonRecord {
    /// Create an active record with only id and name set.
    pub fn new(id: impl Into<ErpPersonId>, full_name: impl Into<String>) -> Self {
        Self {
            external_person_id: id.into(),
            full_name: full_name.into(),
            job_title: None,
            org_unit_id: None,
            manager_id: None,
            active: true,
        }
    }

    /// Set the organizational unit.
    #[must_use]
    pub fn in_org_unit(mut self, org_unit_id: impl Into<String>) -> Self {
        self.org_unit_id = Some(org_unit_id.into());
        self
    }

    /// Mark the record inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Split the ERP full name into (given name, surname).
    ///
    /// The first token is the given name and the remaining tokens form the surname.
    #[must_use]
    pub fn split_name(&self) -> (String, String) {
        let mut tokens = self.full_name.split_whitespace();
        let given = tokens.next().unwrap_or_default().to_string();
        let surname = tokens.collect::<Vec<_>>().join(" ");
        (given, surname)
    }
}

/// An account in the application's own store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub given_name: String,
    pub surname: String,
    /// Full name exactly as the ERP roster spells it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name_source_erp: Option<String>,
    pub auth_mode: AuthMode,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_erp_id: Option<ErpPersonId>,
    /// PHC-formatted hash of the local secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_secret_hash: Option<String>,
}

impl std::fmt::Debug for LocalAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAccount")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("given_name", &self.given_name)
            .field("surname", &self.surname)
            .field("full_name_source_erp", &self.full_name_source_erp)
            .field("auth_mode", &self.auth_mode)
            .field("active", &self.active)
            .field("last_login", &self.last_login)
            .field("last_sync_at", &self.last_sync_at)
            .field("linked_erp_id", &self.linked_erp_id)
            .field(
                "local_secret_hash",
                &self.local_secret_hash.as_ref().map(|_| "***REDACTED***"),
            )
            .finish()
    }
}

impl LocalAccount {
    /// Create an active, local-mode account with no ERP link.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        given_name: impl Into<String>,
        surname: impl Into<String>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            username: username.into(),
            email: email.into(),
            given_name: given_name.into(),
            surname: surname.into(),
            full_name_source_erp: None,
            auth_mode: AuthMode::Local,
            active: true,
            last_login: None,
            last_sync_at: None,
            linked_erp_id: None,
            local_secret_hash: None,
        }
    }

    /// Link the account to an ERP person.
    #[must_use]
    pub fn linked_to(mut self, erp_id: ErpPersonId) -> Self {
        self.linked_erp_id = Some(erp_id);
        self
    }

    /// Switch the account to directory authentication.
    #[must_use]
    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    /// Attach a local secret hash.
    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.local_secret_hash = Some(hash.into());
        self
    }

    /// "given surname" as stored locally.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name.trim(), self.surname.trim())
            .trim()
            .to_string()
    }

    /// Hints about the owner used to reject passwords containing personal data.
    #[must_use]
    pub fn owner_hints(&self) -> OwnerHints {
        OwnerHints {
            username: Some(self.username.clone()),
            given_name: Some(self.given_name.clone()),
            surname: Some(self.surname.clone()),
            email: Some(self.email.clone()),
        }
    }
}

/// Personal data a candidate password must not contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerHints {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl OwnerHints {
    /// Hints carrying only a username.
    pub fn for_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Labelled hint values: username, given name, surname and the email local part.
    #[must_use]
    pub fn labelled(&self) -> Vec<(&'static str, &str)> {
        let email_local = self
            .email
            .as_deref()
            .map(|email| email.split('@').next().unwrap_or(email));

        [
            ("username", self.username.as_deref()),
            ("given name", self.given_name.as_deref()),
            ("surname", self.surname.as_deref()),
            ("email", email_local),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v)))
        .collect()
    }
}

/// Permissions granted through the position → role → permission chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    /// Create an empty permission set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a permission is granted.
    #[must_use]
    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    /// Grant a permission.
    pub fn insert(&mut self, permission: impl Into<String>) {
        self.0.insert(permission.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_identity_full_name_prefers_given_and_surname() {
        let identity = DirectoryIdentity::new("mlopez")
            .with_names("Maria", "Lopez")
            .with_display_name("Lopez, Maria");
        assert_eq!(identity.full_name(), "Maria Lopez");
    }

    #[test]
    fn test_directory_identity_full_name_falls_back() {
        let identity = DirectoryIdentity::new("mlopez").with_display_name("Maria Lopez");
        assert_eq!(identity.full_name(), "Maria Lopez");

        assert_eq!(DirectoryIdentity::new("svc-backup").full_name(), "svc-backup");
    }

    #[test]
    fn test_erp_record_split_name() {
        let record = ErpPersonRecord::new(1, "Juan Carlos Perez");
        assert_eq!(
            record.split_name(),
            ("Juan".to_string(), "Carlos Perez".to_string())
        );

        let single = ErpPersonRecord::new(2, "Cher");
        assert_eq!(single.split_name(), ("Cher".to_string(), String::new()));
    }

    #[test]
    fn test_erp_record_deserializes_with_id_alias() {
        let record: ErpPersonRecord =
            serde_json::from_str(r#"{"id": 1, "full_name": "Maria Lopez"}"#).unwrap();
        assert_eq!(record.external_person_id, ErpPersonId::from(1));
        assert!(record.active);
    }

    #[test]
    fn test_local_account_debug_redacts_hash() {
        let account = LocalAccount::new("jdoe", "jdoe@example.com", "John", "Doe")
            .with_secret_hash("$argon2id$v=19$secret");
        let debug = format!("{account:?}");
        assert!(debug.contains("***REDACTED***"));
        assert!(!debug.contains("argon2id"));
    }

    #[test]
    fn test_owner_hints_use_email_local_part() {
        let hints = LocalAccount::new("jdoe", "john.doe@example.com", "John", "Doe").owner_hints();
        let labelled = hints.labelled();
        assert!(labelled.contains(&("email", "john.doe")));
        assert!(labelled.contains(&("username", "jdoe")));
    }

    #[test]
    fn test_permission_set_from_iter() {
        let permissions: PermissionSet = ["tickets.read", "tickets.write"].into_iter().collect();
        assert!(permissions.contains("tickets.read"));
        assert!(!permissions.contains("admin"));
        assert_eq!(permissions.len(), 2);
    }
}
