//! Directory session abstraction.
//!
//! A session is one connection over one transport. The client only ever uses
//! sessions through [`with_session`], which unbinds on every exit path.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{DirectoryFlavor, Transport};
use crate::error::{DirectoryError, DirectoryResult};

/// LDAP result code for invalid credentials.
pub const RC_INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code for a constraint violation (AD password policy).
pub const RC_CONSTRAINT_VIOLATION: u32 = 19;
/// LDAP result code for an exceeded size limit.
pub const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;

/// A search result entry with string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl RawEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add an attribute value.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.entry(name.into()).or_default().push(value.into());
        self
    }

    /// First value of an attribute, matched case-insensitively.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// All values of an attribute, matched case-insensitively.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&Vec<String>> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }
}

/// One open connection to the directory.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. Rejected credentials map to [`DirectoryError::AuthFailed`].
    async fn bind(&mut self, bind_name: &str, secret: &str) -> DirectoryResult<()>;

    /// Subtree search returning at most `size_limit` entries.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
        size_limit: usize,
    ) -> DirectoryResult<Vec<RawEntry>>;

    /// Change the password of the entry at `dn`, proving the old one.
    async fn change_password(
        &mut self,
        dn: &str,
        old_secret: &str,
        new_secret: &str,
        flavor: DirectoryFlavor,
    ) -> DirectoryResult<()>;

    /// Close the session.
    async fn unbind(&mut self) -> DirectoryResult<()>;
}

/// Opens sessions over a given transport.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, transport: Transport) -> DirectoryResult<Box<dyn DirectorySession>>;
}

/// Limit on the unbind performed when a scoped session ends.
const UNBIND_TIMEOUT: Duration = Duration::from_secs(2);

/// Open a session, run `op` on it and always unbind afterwards.
///
/// The session is unbound whether `op` succeeds or fails. If the surrounding
/// future is dropped (a strategy timeout), dropping the session closes the
/// connection instead.
pub async fn with_session<T, F>(
    factory: &dyn SessionFactory,
    transport: Transport,
    op: F,
) -> DirectoryResult<T>
where
    F: for<'s> FnOnce(&'s mut dyn DirectorySession) -> BoxFuture<'s, DirectoryResult<T>>,
{
    let mut session = factory.open(transport).await?;
    let outcome = op(session.as_mut()).await;

    match tokio::time::timeout(UNBIND_TIMEOUT, session.unbind()).await {
        Ok(Ok(())) => debug!(%transport, "Session released"),
        Ok(Err(e)) => warn!(%transport, error = %e, "Error during unbind"),
        Err(_) => warn!(%transport, "Unbind timed out"),
    }

    outcome
}

/// Encode a password for Active Directory's `unicodePwd` attribute.
///
/// The password is surrounded with double quotes and encoded as UTF-16LE.
pub fn encode_ad_password(password: &str) -> DirectoryResult<Vec<u8>> {
    if password.is_empty() {
        return Err(DirectoryError::invalid_configuration(
            "password cannot be empty",
        ));
    }
    let quoted = format!("\"{password}\"");
    Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ad_password() {
        let encoded = encode_ad_password("Ab1").unwrap();
        // "Ab1" quoted, UTF-16LE
        assert_eq!(
            encoded,
            vec![0x22, 0, 0x41, 0, 0x62, 0, 0x31, 0, 0x22, 0]
        );
    }

    #[test]
    fn test_encode_ad_password_non_ascii() {
        let encoded = encode_ad_password("é").unwrap();
        assert_eq!(encoded, vec![0x22, 0, 0xE9, 0, 0x22, 0]);
    }

    #[test]
    fn test_encode_empty_password_fails() {
        assert!(encode_ad_password("").is_err());
    }

    #[test]
    fn test_raw_entry_attribute_lookup_ignores_case() {
        let entry = RawEntry::new("CN=Maria Lopez,DC=corp")
            .with_attr("sAMAccountName", "mlopez")
            .with_attr("memberOf", "CN=Staff,DC=corp")
            .with_attr("memberOf", "CN=Nurses,DC=corp")
            .with_attr("title", "  ");
        assert_eq!(entry.first("samaccountname"), Some("mlopez"));
        assert_eq!(entry.values("MEMBEROF").map(Vec::len), Some(2));
        assert_eq!(entry.first("title"), None);
        assert_eq!(entry.first("mail"), None);
    }
}
