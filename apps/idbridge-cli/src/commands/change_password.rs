//! Change-password command

use clap::Args;
use idbridge::ChangeError;

use super::{open_service, prompt_secret, StoreArgs};
use crate::error::{CliError, CliResult};

/// Arguments for the change-password command
#[derive(Debug, Args)]
pub struct ChangePasswordArgs {
    pub username: String,
}

/// Execute the change-password command
pub async fn execute(args: ChangePasswordArgs, stores: &StoreArgs) -> CliResult<()> {
    let service = open_service(stores).await?;
    let current = prompt_secret("Current password")?;
    let new = prompt_secret("New password")?;
    let confirm = prompt_secret("Confirm new password")?;

    service
        .change_password(&args.username, &current, &new, &confirm)
        .await
        .map_err(|e| match e {
            ChangeError::PolicyRejected { violations } => {
                CliError::PolicyRejected(violations.iter().map(ToString::to_string).collect())
            }
            other => CliError::ChangeFailed(other.public_message()),
        })?;

    println!("Password changed for {}", args.username);
    Ok(())
}
