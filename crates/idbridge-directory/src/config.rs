//! Directory configuration
//!
//! Connection, schema and password-change settings for Active Directory and
//! generic LDAP servers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DirectoryError, DirectoryResult};
use crate::escape::escape_dn_value;

/// Connection security for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Dedicated TLS connection (`ldaps://`, usually port 636).
    Ldaps,
    /// Plain connection upgraded with STARTTLS.
    StartTls,
    /// Unencrypted connection. Never used for password writes.
    Plain,
}

impl Transport {
    /// Whether the transport encrypts traffic.
    #[must_use]
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Transport::Plain)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Transport::Ldaps => "ldaps",
            Transport::StartTls => "starttls",
            Transport::Plain => "plain",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Directory server family; decides attribute names and the password write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryFlavor {
    /// Active Directory: `sAMAccountName`, `unicodePwd` delete/add change.
    ActiveDirectory,
    /// Generic LDAP: `uid`, RFC 3062 password modify extended operation.
    Ldap,
}

/// Configuration for the directory client.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory hostname or IP address.
    pub host: String,

    /// Port for plain and STARTTLS connections.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for LDAPS connections.
    #[serde(default = "default_ssl_port")]
    pub ssl_port: u16,

    /// Base DN for all operations (e.g., "dc=corp,dc=example").
    pub base_dn: String,

    /// User container relative to `base_dn` (e.g., "ou=people").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_container: Option<String>,

    #[serde(default = "default_flavor")]
    pub flavor: DirectoryFlavor,

    /// Service account used for roster searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_bind_dn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_bind_password: Option<String>,

    /// Login attribute; defaults to `sAMAccountName` or `uid` by flavor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_attribute: Option<String>,

    /// Filter selecting person entries for roster searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_filter: Option<String>,

    /// Bind name template with a `{username}` placeholder, e.g.
    /// `{username}@corp.example` or `uid={username},ou=people,dc=corp,dc=example`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_template: Option<String>,

    /// Transports tried, in order, for binds and searches.
    #[serde(default = "default_transports")]
    pub transports: Vec<Transport>,

    /// Verify the server certificate on encrypted transports.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Wall-clock limit for one strategy attempt.
    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,

    /// Maximum entries returned by a roster search.
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl_port", &self.ssl_port)
            .field("base_dn", &self.base_dn)
            .field("user_container", &self.user_container)
            .field("flavor", &self.flavor)
            .field("service_bind_dn", &self.service_bind_dn)
            .field(
                "service_bind_password",
                &self.service_bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("user_attribute", &self.user_attribute)
            .field("user_filter", &self.user_filter)
            .field("bind_template", &self.bind_template)
            .field("transports", &self.transports)
            .field("verify_tls", &self.verify_tls)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("strategy_timeout_ms", &self.strategy_timeout_ms)
            .field("size_limit", &self.size_limit)
            .finish()
    }
}

fn default_port() -> u16 {
    389
}

fn default_ssl_port() -> u16 {
    636
}

fn default_flavor() -> DirectoryFlavor {
    DirectoryFlavor::ActiveDirectory
}

fn default_transports() -> Vec<Transport> {
    vec![Transport::Ldaps, Transport::StartTls, Transport::Plain]
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_strategy_timeout_ms() -> u64 {
    15_000
}

fn default_size_limit() -> usize {
    5_000
}

impl DirectoryConfig {
    /// Create a config with required fields and defaults for everything else.
    pub fn new(host: impl Into<String>, base_dn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            ssl_port: default_ssl_port(),
            base_dn: base_dn.into(),
            user_container: None,
            flavor: default_flavor(),
            service_bind_dn: None,
            service_bind_password: None,
            user_attribute: None,
            user_filter: None,
            bind_template: None,
            transports: default_transports(),
            verify_tls: true,
            connect_timeout_ms: default_connect_timeout_ms(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
            size_limit: default_size_limit(),
        }
    }

    /// Set the directory flavor.
    #[must_use]
    pub fn with_flavor(mut self, flavor: DirectoryFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the service account used for roster searches.
    #[must_use]
    pub fn with_service_account(
        mut self,
        bind_dn: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.service_bind_dn = Some(bind_dn.into());
        self.service_bind_password = Some(password.into());
        self
    }

    /// Set the user container.
    #[must_use]
    pub fn with_user_container(mut self, container: impl Into<String>) -> Self {
        self.user_container = Some(container.into());
        self
    }

    /// Set the bind name template.
    #[must_use]
    pub fn with_bind_template(mut self, template: impl Into<String>) -> Self {
        self.bind_template = Some(template.into());
        self
    }

    /// Set the transports to try, in order.
    #[must_use]
    pub fn with_transports(mut self, transports: Vec<Transport>) -> Self {
        self.transports = transports;
        self
    }

    /// Set the per-strategy timeout.
    #[must_use]
    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// URL for a transport.
    #[must_use]
    pub fn url(&self, transport: Transport) -> String {
        match transport {
            Transport::Ldaps => format!("ldaps://{}:{}", self.host, self.ssl_port),
            Transport::StartTls | Transport::Plain => {
                format!("ldap://{}:{}", self.host, self.port)
            }
        }
    }

    /// Base DN for user searches.
    #[must_use]
    pub fn users_base(&self) -> String {
        match &self.user_container {
            Some(container) if !container.is_empty() => {
                format!("{},{}", container, self.base_dn)
            }
            _ => self.base_dn.clone(),
        }
    }

    /// Login attribute.
    #[must_use]
    pub fn user_attribute(&self) -> &str {
        match (&self.user_attribute, self.flavor) {
            (Some(attr), _) => attr,
            (None, DirectoryFlavor::ActiveDirectory) => "sAMAccountName",
            (None, DirectoryFlavor::Ldap) => "uid",
        }
    }

    /// Filter selecting person entries.
    #[must_use]
    pub fn user_filter(&self) -> String {
        if let Some(filter) = &self.user_filter {
            return filter.clone();
        }
        match self.flavor {
            DirectoryFlavor::ActiveDirectory => format!(
                "(&(objectCategory=person)(objectClass=user)({}=*))",
                self.user_attribute()
            ),
            DirectoryFlavor::Ldap => {
                format!("(&(objectClass=inetOrgPerson)({}=*))", self.user_attribute())
            }
        }
    }

    /// DNS domain derived from the `dc=` components of the base DN.
    #[must_use]
    pub fn domain(&self) -> String {
        self.base_dn
            .split(',')
            .filter_map(|rdn| {
                let (attr, value) = rdn.trim().split_once('=')?;
                attr.eq_ignore_ascii_case("dc").then(|| value.trim().to_string())
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Name a user binds with.
    ///
    /// Uses the template when set. Otherwise Active Directory binds with the
    /// user principal name and generic LDAP with the entry DN under the user
    /// container.
    #[must_use]
    pub fn bind_name(&self, username: &str) -> String {
        if let Some(template) = &self.bind_template {
            let value = if template.contains('=') {
                escape_dn_value(username)
            } else {
                username.to_string()
            };
            return template.replace("{username}", &value);
        }

        match self.flavor {
            DirectoryFlavor::ActiveDirectory => format!("{}@{}", username, self.domain()),
            DirectoryFlavor::Ldap => format!(
                "{}={},{}",
                self.user_attribute(),
                escape_dn_value(username),
                self.users_base()
            ),
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    /// Whether a service account is configured.
    #[must_use]
    pub fn has_service_account(&self) -> bool {
        self.service_bind_dn
            .as_deref()
            .is_some_and(|dn| !dn.trim().is_empty())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.host.trim().is_empty() {
            return Err(DirectoryError::invalid_configuration("host is required"));
        }
        if self.base_dn.trim().is_empty() {
            return Err(DirectoryError::invalid_configuration("base_dn is required"));
        }
        if self.transports.is_empty() {
            return Err(DirectoryError::invalid_configuration(
                "at least one transport is required",
            ));
        }
        if self.strategy_timeout_ms == 0 {
            return Err(DirectoryError::invalid_configuration(
                "strategy_timeout_ms must be greater than zero",
            ));
        }
        if self.size_limit == 0 {
            return Err(DirectoryError::invalid_configuration(
                "size_limit must be greater than zero",
            ));
        }
        if self.has_service_account() && self.service_bind_password.is_none() {
            return Err(DirectoryError::invalid_configuration(
                "service_bind_password is required when service_bind_dn is set",
            ));
        }
        if let Some(template) = &self.bind_template {
            if !template.contains("{username}") {
                return Err(DirectoryError::invalid_configuration(
                    "bind_template must contain {username}",
                ));
            }
        }
        Ok(())
    }
}

/// How password writes are attempted after the LDAP transports.
#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordChangeConfig {
    /// Privileged helper program run out of process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_program: Option<PathBuf>,

    /// Arguments passed before the username and DN.
    #[serde(default)]
    pub helper_args: Vec<String>,

    /// External HTTP change API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Bearer token for the change API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Re-authentication attempts used to verify a change.
    #[serde(default = "default_verify_attempts")]
    pub verify_attempts: u32,

    /// Delay between verification attempts, for replication lag.
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
}

impl std::fmt::Debug for PasswordChangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChangeConfig")
            .field("helper_program", &self.helper_program)
            .field("helper_args", &self.helper_args)
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***REDACTED***"))
            .field("verify_attempts", &self.verify_attempts)
            .field("verify_delay_ms", &self.verify_delay_ms)
            .finish()
    }
}

fn default_verify_attempts() -> u32 {
    3
}

fn default_verify_delay_ms() -> u64 {
    1_000
}

impl Default for PasswordChangeConfig {
    fn default() -> Self {
        Self {
            helper_program: None,
            helper_args: Vec::new(),
            api_url: None,
            api_token: None,
            verify_attempts: default_verify_attempts(),
            verify_delay_ms: default_verify_delay_ms(),
        }
    }
}

impl PasswordChangeConfig {
    /// Set the privileged helper.
    #[must_use]
    pub fn with_helper(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.helper_program = Some(program.into());
        self.helper_args = args;
        self
    }

    /// Set the external change API.
    #[must_use]
    pub fn with_api(mut self, url: impl Into<String>, token: Option<String>) -> Self {
        self.api_url = Some(url.into());
        self.api_token = token;
        self
    }

    /// Set verification retries.
    #[must_use]
    pub fn with_verification(mut self, attempts: u32, delay: Duration) -> Self {
        self.verify_attempts = attempts;
        self.verify_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.verify_attempts == 0 {
            return Err(DirectoryError::invalid_configuration(
                "verify_attempts must be at least 1",
            ));
        }
        if let Some(url) = &self.api_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(DirectoryError::invalid_configuration(
                    "api_url must be an http(s) URL",
                ));
            }
        }
        Ok(())
    }
}
