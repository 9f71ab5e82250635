//! Sessions backed by `ldap3`.

use async_trait::async_trait;
use ldap3::exop::PasswordModify;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry, SearchOptions};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::{DirectoryConfig, DirectoryFlavor, Transport};
use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{
    encode_ad_password, DirectorySession, RawEntry, SessionFactory, RC_CONSTRAINT_VIOLATION,
    RC_INVALID_CREDENTIALS, RC_SIZE_LIMIT_EXCEEDED,
};

/// Opens real LDAP connections.
#[derive(Debug, Clone)]
pub struct LdapSessionFactory {
    config: Arc<DirectoryConfig>,
}

impl LdapSessionFactory {
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for LdapSessionFactory {
    #[instrument(skip(self), fields(host = %self.config.host))]
    async fn open(&self, transport: Transport) -> DirectoryResult<Box<dyn DirectorySession>> {
        let url = self.config.url(transport);
        debug!(url = %url, "Connecting to directory");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connect_timeout())
            .set_starttls(transport == Transport::StartTls)
            .set_no_tls_verify(!self.config.verify_tls);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::unavailable_with_source(
                    format!("failed to connect to {url} over {transport}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        Ok(Box::new(LdapSession {
            ldap: Some(ldap),
            transport,
        }))
    }
}

/// One `ldap3` connection.
///
/// Dropping a session that was not unbound spawns the unbind, so a strategy
/// cancelled by its timeout still releases the connection.
pub struct LdapSession {
    ldap: Option<Ldap>,
    transport: Transport,
}

impl LdapSession {
    fn handle(&mut self) -> DirectoryResult<&mut Ldap> {
        self.ldap
            .as_mut()
            .ok_or_else(|| DirectoryError::unavailable("session already closed"))
    }
}

fn transport_error(operation: &str, e: LdapError) -> DirectoryError {
    DirectoryError::unavailable_with_source(format!("LDAP {operation} failed"), e)
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, bind_name: &str, secret: &str) -> DirectoryResult<()> {
        let transport = self.transport;
        let result = self
            .handle()?
            .simple_bind(bind_name, secret)
            .await
            .map_err(|e| transport_error("bind", e))?;

        match result.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::AuthFailed),
            rc => Err(DirectoryError::operation_failed(format!(
                "bind over {transport} failed with code {rc}: {}",
                result.text
            ))),
        }
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
        size_limit: usize,
    ) -> DirectoryResult<Vec<RawEntry>> {
        let limit = i32::try_from(size_limit).unwrap_or(i32::MAX);
        let result = self
            .handle()?
            .with_search_options(SearchOptions::new().sizelimit(limit))
            .search(base, Scope::Subtree, filter, attrs.to_vec())
            .await
            .map_err(|e| transport_error("search", e))?;

        let ldap3::result::SearchResult(entries, status) = result;
        if status.rc != 0 && status.rc != RC_SIZE_LIMIT_EXCEEDED {
            return Err(DirectoryError::operation_failed(format!(
                "search failed with code {}: {}",
                status.rc, status.text
            )));
        }
        if status.rc == RC_SIZE_LIMIT_EXCEEDED {
            warn!(size_limit, "Directory search truncated by size limit");
        }

        Ok(entries
            .into_iter()
            .take(size_limit)
            .map(SearchEntry::construct)
            .map(|entry| RawEntry {
                dn: entry.dn,
                attrs: entry.attrs,
            })
            .collect())
    }

    async fn change_password(
        &mut self,
        dn: &str,
        old_secret: &str,
        new_secret: &str,
        flavor: DirectoryFlavor,
    ) -> DirectoryResult<()> {
        let transport = self.transport;
        if !transport.is_encrypted() {
            return Err(DirectoryError::invalid_configuration(
                "password changes require an encrypted transport",
            ));
        }

        let status = match flavor {
            DirectoryFlavor::ActiveDirectory => {
                let old_value = encode_ad_password(old_secret)?;
                let new_value = encode_ad_password(new_secret)?;
                let attr = b"unicodePwd".to_vec();
                let mods = vec![
                    Mod::Delete(attr.clone(), HashSet::from([old_value])),
                    Mod::Add(attr, HashSet::from([new_value])),
                ];
                self.handle()?
                    .modify(dn, mods)
                    .await
                    .map_err(|e| transport_error("modify", e))?
            }
            DirectoryFlavor::Ldap => {
                let exop = PasswordModify {
                    user_id: Some(dn),
                    old_pass: Some(old_secret),
                    new_pass: Some(new_secret),
                };
                let ldap3::result::ExopResult(_, status) = self
                    .handle()?
                    .extended(exop)
                    .await
                    .map_err(|e| transport_error("password modify", e))?;
                status
            }
        };

        match status.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::AuthFailed),
            RC_CONSTRAINT_VIOLATION => Err(DirectoryError::ChangeRejected {
                message: status.text,
            }),
            rc => Err(DirectoryError::operation_failed(format!(
                "password write over {transport} failed with code {rc}: {}",
                status.text
            ))),
        }
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        match self.ldap.take() {
            Some(mut ldap) => ldap
                .unbind()
                .await
                .map_err(|e| transport_error("unbind", e)),
            None => Ok(()),
        }
    }
}

impl Drop for LdapSession {
    fn drop(&mut self) {
        let Some(mut ldap) = self.ldap.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = ldap.unbind().await {
                    debug!(error = %e, "Deferred unbind failed");
                }
            });
        }
    }
}
