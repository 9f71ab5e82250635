//! Login command - try a hybrid login without starting a session

use clap::Args;

use super::{open_service, prompt_secret, StoreArgs};
use crate::error::{CliError, CliResult};

/// Arguments for the login command
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Directory or local username
    pub username: String,
}

/// Execute the login command
pub async fn execute(args: LoginArgs, stores: &StoreArgs) -> CliResult<()> {
    let service = open_service(stores).await?;
    let password = prompt_secret("Password")?;

    let user = service
        .authenticate(&args.username, &password)
        .await
        .map_err(|e| CliError::LoginFailed(e.public_message().to_string()))?;

    println!(
        "Authenticated {} ({}) via {:?}",
        user.account.username,
        user.account.full_name(),
        user.path
    );
    let permissions: Vec<&str> = user.permissions.iter().collect();
    if permissions.is_empty() {
        println!("Permissions: none");
    } else {
        println!("Permissions: {}", permissions.join(", "));
    }
    Ok(())
}
