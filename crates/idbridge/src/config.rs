//! Aggregated configuration.
//!
//! Every component config can be loaded from `IDBRIDGE_*` environment
//! variables. Only the directory host and base DN are required.
//!
//! | Variable | Default |
//! |---|---|
//! | `IDBRIDGE_LDAP_HOST` | required |
//! | `IDBRIDGE_LDAP_BASE_DN` | required |
//! | `IDBRIDGE_LDAP_PORT` / `IDBRIDGE_LDAP_SSL_PORT` | 389 / 636 |
//! | `IDBRIDGE_LDAP_FLAVOR` | `active_directory` (or `ldap`) |
//! | `IDBRIDGE_LDAP_TRANSPORTS` | `ldaps,starttls,plain` |
//! | `IDBRIDGE_LDAP_USER_CONTAINER`, `IDBRIDGE_LDAP_BIND_TEMPLATE` | unset |
//! | `IDBRIDGE_LDAP_SERVICE_DN`, `IDBRIDGE_LDAP_SERVICE_PASSWORD` | unset |
//! | `IDBRIDGE_LDAP_VERIFY_TLS` | `true` |
//! | `IDBRIDGE_LDAP_TIMEOUT_MS` (per strategy) | 15000 |
//! | `IDBRIDGE_LDAP_SIZE_LIMIT` | 5000 |
//! | `IDBRIDGE_PASSWORD_HELPER`, `IDBRIDGE_PASSWORD_HELPER_ARGS` | unset |
//! | `IDBRIDGE_PASSWORD_API_URL`, `IDBRIDGE_PASSWORD_API_TOKEN` | unset |
//! | `IDBRIDGE_VERIFY_ATTEMPTS` / `IDBRIDGE_VERIFY_DELAY_MS` | 3 / 1000 |
//! | `IDBRIDGE_LOGIN_THRESHOLD` / `IDBRIDGE_BATCH_THRESHOLD` | 70 / 80 |
//! | `IDBRIDGE_PASSWORD_MIN_LENGTH` | 8 |
//! | `IDBRIDGE_PASSWORD_REQUIRE_SPECIAL` | `false` |
//! | `IDBRIDGE_EMAIL_DOMAIN` | `example.invalid` |
//! | `IDBRIDGE_ROSTER_CACHE_TTL_SECS` | 300 |
//! | `IDBRIDGE_ALLOW_EMPTY_ROSTER` | `false` |

use idbridge_directory::{DirectoryConfig, DirectoryFlavor, PasswordChangeConfig, Transport};
use idbridge_matching::MatcherConfig;
use idbridge_policy::PasswordPolicy;
use idbridge_reconcile::ReconcileConfig;
use std::env::VarError;
use std::str::FromStr;

use crate::error::{ConfigError, ServiceError};

/// Configuration of every component.
#[derive(Debug, Clone)]
pub struct IdbridgeConfig {
    pub directory: DirectoryConfig,
    pub password_change: PasswordChangeConfig,
    pub matcher: MatcherConfig,
    pub password_policy: PasswordPolicy,
    pub reconcile: ReconcileConfig,
}

impl IdbridgeConfig {
    /// Defaults for everything except the directory location.
    pub fn new(directory: DirectoryConfig) -> Self {
        Self {
            directory,
            password_change: PasswordChangeConfig::default(),
            matcher: MatcherConfig::default(),
            password_policy: PasswordPolicy::default(),
            reconcile: ReconcileConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Tests supply variables this way without touching the process
    /// environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let host = required(&reader, "IDBRIDGE_LDAP_HOST")?;
        let base_dn = required(&reader, "IDBRIDGE_LDAP_BASE_DN")?;
        let mut directory = DirectoryConfig::new(host, base_dn);

        directory.port = parsed(&reader, "IDBRIDGE_LDAP_PORT", directory.port)?;
        directory.ssl_port = parsed(&reader, "IDBRIDGE_LDAP_SSL_PORT", directory.ssl_port)?;
        if let Some(flavor) = optional(&reader, "IDBRIDGE_LDAP_FLAVOR") {
            directory.flavor = parse_flavor(&flavor).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "IDBRIDGE_LDAP_FLAVOR".into(),
                    format!("unknown flavor '{flavor}' (expected active_directory or ldap)"),
                )
            })?;
        }
        if let Some(list) = optional(&reader, "IDBRIDGE_LDAP_TRANSPORTS") {
            directory.transports = parse_transports(&list)?;
        }
        directory.user_container = optional(&reader, "IDBRIDGE_LDAP_USER_CONTAINER");
        directory.bind_template = optional(&reader, "IDBRIDGE_LDAP_BIND_TEMPLATE");
        directory.service_bind_dn = optional(&reader, "IDBRIDGE_LDAP_SERVICE_DN");
        directory.service_bind_password = optional(&reader, "IDBRIDGE_LDAP_SERVICE_PASSWORD");
        directory.verify_tls = parsed_bool(&reader, "IDBRIDGE_LDAP_VERIFY_TLS", true)?;
        directory.strategy_timeout_ms =
            parsed(&reader, "IDBRIDGE_LDAP_TIMEOUT_MS", directory.strategy_timeout_ms)?;
        directory.size_limit = parsed(&reader, "IDBRIDGE_LDAP_SIZE_LIMIT", directory.size_limit)?;

        let mut password_change = PasswordChangeConfig::default();
        if let Some(program) = optional(&reader, "IDBRIDGE_PASSWORD_HELPER") {
            let args = optional(&reader, "IDBRIDGE_PASSWORD_HELPER_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            password_change = password_change.with_helper(program, args);
        }
        if let Some(url) = optional(&reader, "IDBRIDGE_PASSWORD_API_URL") {
            password_change =
                password_change.with_api(url, optional(&reader, "IDBRIDGE_PASSWORD_API_TOKEN"));
        }
        password_change.verify_attempts = parsed(
            &reader,
            "IDBRIDGE_VERIFY_ATTEMPTS",
            password_change.verify_attempts,
        )?;
        password_change.verify_delay_ms = parsed(
            &reader,
            "IDBRIDGE_VERIFY_DELAY_MS",
            password_change.verify_delay_ms,
        )?;

        let mut matcher = MatcherConfig::default();
        matcher.login_threshold = threshold(&reader, "IDBRIDGE_LOGIN_THRESHOLD", matcher.login_threshold)?;
        matcher.batch_threshold = threshold(&reader, "IDBRIDGE_BATCH_THRESHOLD", matcher.batch_threshold)?;

        let mut password_policy = PasswordPolicy::default();
        password_policy.min_length = parsed(
            &reader,
            "IDBRIDGE_PASSWORD_MIN_LENGTH",
            password_policy.min_length,
        )?;
        password_policy.require_special = parsed_bool(
            &reader,
            "IDBRIDGE_PASSWORD_REQUIRE_SPECIAL",
            password_policy.require_special,
        )?;

        let mut reconcile = ReconcileConfig::default();
        if let Some(domain) = optional(&reader, "IDBRIDGE_EMAIL_DOMAIN") {
            reconcile.email_domain = domain;
        }
        reconcile.roster_cache_ttl_secs = parsed(
            &reader,
            "IDBRIDGE_ROSTER_CACHE_TTL_SECS",
            reconcile.roster_cache_ttl_secs,
        )?;
        reconcile.allow_empty_roster = parsed_bool(
            &reader,
            "IDBRIDGE_ALLOW_EMPTY_ROSTER",
            reconcile.allow_empty_roster,
        )?;

        Ok(Self {
            directory,
            password_change,
            matcher,
            password_policy,
            reconcile,
        })
    }

    /// Validate every component config.
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.directory.validate()?;
        self.password_change.validate()?;
        self.password_policy.validate()?;
        self.reconcile.validate()?;
        Ok(())
    }
}

fn optional<F>(reader: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(reader: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    optional(reader, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn parsed<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(reader, key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn parsed_bool<F>(reader: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match optional(reader, key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{other}' is not a boolean"),
        )),
    }
}

fn threshold<F>(reader: &F, key: &str, default: u8) -> Result<u8, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let value = parsed(reader, key, default)?;
    if value > 100 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be between 0 and 100".to_string(),
        ));
    }
    Ok(value)
}

fn parse_flavor(value: &str) -> Option<DirectoryFlavor> {
    match value.to_ascii_lowercase().as_str() {
        "active_directory" | "ad" => Some(DirectoryFlavor::ActiveDirectory),
        "ldap" => Some(DirectoryFlavor::Ldap),
        _ => None,
    }
}

fn parse_transports(list: &str) -> Result<Vec<Transport>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| match t.to_ascii_lowercase().as_str() {
            "ldaps" => Ok(Transport::Ldaps),
            "starttls" => Ok(Transport::StartTls),
            "plain" => Ok(Transport::Plain),
            other => Err(ConfigError::InvalidValue(
                "IDBRIDGE_LDAP_TRANSPORTS".into(),
                format!("unknown transport '{other}'"),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    fn minimal() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("IDBRIDGE_LDAP_HOST", "dc01.corp.example"),
            ("IDBRIDGE_LDAP_BASE_DN", "DC=corp,DC=example"),
        ])
    }

    #[test]
    fn test_missing_host() {
        let err = IdbridgeConfig::from_reader(make_reader(HashMap::new())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
        assert!(err.to_string().contains("IDBRIDGE_LDAP_HOST"));
    }

    #[test]
    fn test_defaults() {
        let config = IdbridgeConfig::from_reader(make_reader(minimal())).unwrap();

        assert_eq!(config.directory.host, "dc01.corp.example");
        assert_eq!(config.directory.flavor, DirectoryFlavor::ActiveDirectory);
        assert_eq!(
            config.directory.transports,
            vec![Transport::Ldaps, Transport::StartTls, Transport::Plain]
        );
        assert!(config.directory.verify_tls);
        assert_eq!(config.matcher.login_threshold, 70);
        assert_eq!(config.matcher.batch_threshold, 80);
        assert_eq!(config.password_change.verify_attempts, 3);
        assert_eq!(config.reconcile.roster_cache_ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_values() {
        let mut vars = minimal();
        vars.extend([
            ("IDBRIDGE_LDAP_FLAVOR", "ldap"),
            ("IDBRIDGE_LDAP_TRANSPORTS", "starttls, ldaps"),
            ("IDBRIDGE_LDAP_SERVICE_DN", "CN=svc-idbridge,OU=Service,DC=corp,DC=example"),
            ("IDBRIDGE_LDAP_SERVICE_PASSWORD", "svc-Secret-1"),
            ("IDBRIDGE_PASSWORD_HELPER", "/usr/local/libexec/pwchange"),
            ("IDBRIDGE_PASSWORD_HELPER_ARGS", "--realm CORP"),
            ("IDBRIDGE_PASSWORD_API_URL", "https://pwd.corp.example/change"),
            ("IDBRIDGE_BATCH_THRESHOLD", "90"),
            ("IDBRIDGE_EMAIL_DOMAIN", "staff.example"),
            ("IDBRIDGE_ALLOW_EMPTY_ROSTER", "yes"),
        ]);

        let config = IdbridgeConfig::from_reader(make_reader(vars)).unwrap();

        assert_eq!(config.directory.flavor, DirectoryFlavor::Ldap);
        assert_eq!(
            config.directory.transports,
            vec![Transport::StartTls, Transport::Ldaps]
        );
        assert!(config.directory.has_service_account());
        assert_eq!(config.password_change.helper_args, vec!["--realm", "CORP"]);
        assert!(config.password_change.api_token.is_none());
        assert_eq!(config.matcher.batch_threshold, 90);
        assert_eq!(config.reconcile.email_domain, "staff.example");
        assert!(config.reconcile.allow_empty_roster);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("IDBRIDGE_LDAP_PORT", "ldap"),
            ("IDBRIDGE_LDAP_FLAVOR", "novell"),
            ("IDBRIDGE_LDAP_TRANSPORTS", "ldaps,telnet"),
            ("IDBRIDGE_LOGIN_THRESHOLD", "120"),
            ("IDBRIDGE_LDAP_VERIFY_TLS", "maybe"),
        ] {
            let mut vars = minimal();
            vars.insert(key, value);
            let err = IdbridgeConfig::from_reader(make_reader(vars)).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(k, _) if k == key),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = minimal();
        vars.insert("IDBRIDGE_LDAP_SERVICE_DN", "CN=svc,DC=corp,DC=example");
        vars.insert("IDBRIDGE_LDAP_SERVICE_PASSWORD", "svc-Secret-1");
        let config = IdbridgeConfig::from_reader(make_reader(vars)).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("svc-Secret-1"));
    }
}
