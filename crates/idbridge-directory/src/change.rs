//! Password write strategies.
//!
//! Tried in order by the client: LDAP write over LDAPS, LDAP write over
//! STARTTLS, the privileged helper process, then the external HTTP change API.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::{DirectoryFlavor, Transport};
use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{with_session, SessionFactory};
use crate::strategy::Strategy;

/// Helper exit status meaning the directory rejected the credentials.
pub const HELPER_EXIT_AUTH_FAILED: i32 = 2;

const MAX_DETAIL_LEN: usize = 200;

/// A password change being written.
#[derive(Clone)]
pub struct ChangeRequest {
    pub username: String,
    pub dn: String,
    pub old_secret: String,
    pub new_secret: String,
}

impl std::fmt::Debug for ChangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRequest")
            .field("username", &self.username)
            .field("dn", &self.dn)
            .field("old_secret", &"***REDACTED***")
            .field("new_secret", &"***REDACTED***")
            .finish()
    }
}

fn truncate(detail: &str) -> String {
    let detail = detail.trim();
    if detail.chars().count() <= MAX_DETAIL_LEN {
        detail.to_string()
    } else {
        let cut: String = detail.chars().take(MAX_DETAIL_LEN).collect();
        format!("{cut}...")
    }
}

/// Bind as the user and write the new password over an LDAP session.
pub struct LdapWriteStrategy {
    factory: Arc<dyn SessionFactory>,
    transport: Transport,
    flavor: DirectoryFlavor,
}

impl LdapWriteStrategy {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        transport: Transport,
        flavor: DirectoryFlavor,
    ) -> Self {
        Self {
            factory,
            transport,
            flavor,
        }
    }
}

#[async_trait]
impl Strategy<ChangeRequest, ()> for LdapWriteStrategy {
    fn label(&self) -> String {
        format!("ldap-write/{}", self.transport)
    }

    async fn attempt(&self, ctx: &ChangeRequest) -> DirectoryResult<()> {
        let request = ctx.clone();
        let flavor = self.flavor;
        with_session(self.factory.as_ref(), self.transport, move |session| {
            Box::pin(async move {
                session.bind(&request.dn, &request.old_secret).await?;
                session
                    .change_password(
                        &request.dn,
                        &request.old_secret,
                        &request.new_secret,
                        flavor,
                    )
                    .await
            })
        })
        .await
    }
}

/// Run a privileged helper program out of process.
///
/// The helper receives the configured arguments followed by the username and
/// DN. Both secrets are written to its stdin, old then new, one per line.
pub struct HelperProcessStrategy {
    program: PathBuf,
    args: Vec<String>,
}

impl HelperProcessStrategy {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Strategy<ChangeRequest, ()> for HelperProcessStrategy {
    fn label(&self) -> String {
        "helper-process".to_string()
    }

    async fn attempt(&self, ctx: &ChangeRequest) -> DirectoryResult<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&ctx.username)
            .arg(&ctx.dn)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DirectoryError::unavailable_with_source(
                    format!("failed to start helper {}", self.program.display()),
                    e,
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = format!("{}\n{}\n", ctx.old_secret, ctx.new_secret);
            stdin.write_all(payload.as_bytes()).await.map_err(|e| {
                DirectoryError::operation_failed_with_source("failed to write to helper", e)
            })?;
        }

        let output = child.wait_with_output().await.map_err(|e| {
            DirectoryError::operation_failed_with_source("failed to wait for helper", e)
        })?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(HELPER_EXIT_AUTH_FAILED) => Err(DirectoryError::AuthFailed),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                debug!(?code, "Helper process failed");
                Err(DirectoryError::operation_failed(format!(
                    "helper exited with {}: {}",
                    code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    truncate(&stderr)
                )))
            }
        }
    }
}

#[derive(Serialize)]
struct ChangeApiRequest<'a> {
    username: &'a str,
    dn: &'a str,
    current_password: &'a str,
    new_password: &'a str,
}

/// Call the external HTTP change API.
pub struct HttpApiStrategy {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpApiStrategy {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> DirectoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DirectoryError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl Strategy<ChangeRequest, ()> for HttpApiStrategy {
    fn label(&self) -> String {
        "http-api".to_string()
    }

    async fn attempt(&self, ctx: &ChangeRequest) -> DirectoryResult<()> {
        let body = ChangeApiRequest {
            username: &ctx.username,
            dn: &ctx.dn,
            current_password: &ctx.old_secret,
            new_password: &ctx.new_secret,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            DirectoryError::unavailable_with_source("change API request failed", e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 | 403 => Err(DirectoryError::AuthFailed),
            400 | 409 | 422 => {
                let detail = response.text().await.unwrap_or_default();
                Err(DirectoryError::ChangeRejected {
                    message: truncate(&detail),
                })
            }
            _ => Err(DirectoryError::operation_failed(format!(
                "change API returned {status}"
            ))),
        }
    }
}
