//! Subcommands.

pub mod change_password;
pub mod check_password;
pub mod login;
pub mod reconcile;

use clap::Args;
use idbridge::{Collaborators, IdbridgeConfig, IdentityService};
use idbridge_core::{ErpRosterSource, StaticErpRoster};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CliResult;
use crate::files::{load_permissions, JsonAccountStore, JsonErpRoster};

/// Where the file-backed collaborators live.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// ERP roster export (JSON array of person records)
    #[arg(long, env = "IDBRIDGE_ERP_ROSTER", global = true)]
    pub erp_roster: Option<PathBuf>,

    /// Local account store (JSON array, created on first write)
    #[arg(
        long,
        env = "IDBRIDGE_ACCOUNTS_FILE",
        default_value = "accounts.json",
        global = true
    )]
    pub accounts: PathBuf,

    /// Permission grants (JSON object with "default" and "users")
    #[arg(long, env = "IDBRIDGE_PERMISSIONS_FILE", global = true)]
    pub permissions: Option<PathBuf>,
}

impl StoreArgs {
    /// Open the file-backed collaborators.
    pub async fn collaborators(&self) -> CliResult<Collaborators> {
        let erp: Arc<dyn ErpRosterSource> = match &self.erp_roster {
            Some(path) => Arc::new(JsonErpRoster::new(path)),
            None => Arc::new(StaticErpRoster::default()),
        };
        let accounts = JsonAccountStore::open(&self.accounts).await?;
        let permissions = load_permissions(self.permissions.as_deref()).await?;

        Ok(Collaborators {
            erp,
            accounts: Arc::new(accounts),
            permissions: Arc::new(permissions),
        })
    }
}

/// Build the service from `IDBRIDGE_*` variables and the file stores.
pub async fn open_service(stores: &StoreArgs) -> CliResult<IdentityService> {
    let config = IdbridgeConfig::from_env()?;
    let collaborators = stores.collaborators().await?;
    Ok(IdentityService::connect(config, collaborators)?)
}

fn prompt_secret(prompt: &str) -> CliResult<String> {
    Ok(dialoguer::Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?)
}
