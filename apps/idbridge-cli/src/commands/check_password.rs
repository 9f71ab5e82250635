//! Check-password command - dry-run the password policy

use clap::Args;
use idbridge::OwnerHints;

use super::{open_service, prompt_secret, StoreArgs};
use crate::error::{CliError, CliResult};

/// Arguments for the check-password command
#[derive(Debug, Args)]
pub struct CheckPasswordArgs {
    /// Username the password must not contain
    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub given_name: Option<String>,

    #[arg(long)]
    pub surname: Option<String>,

    #[arg(long)]
    pub email: Option<String>,
}

impl CheckPasswordArgs {
    pub fn hints(&self) -> OwnerHints {
        OwnerHints {
            username: self.username.clone(),
            given_name: self.given_name.clone(),
            surname: self.surname.clone(),
            email: self.email.clone(),
        }
    }
}

/// Execute the check-password command
pub async fn execute(args: CheckPasswordArgs, stores: &StoreArgs) -> CliResult<()> {
    let service = open_service(stores).await?;
    let password = prompt_secret("Password to check")?;

    let evaluation = service.validate_password_policy(&password, &args.hints());
    println!(
        "Strength: {} ({}/100)",
        evaluation.strength_label, evaluation.strength_score
    );

    if evaluation.is_valid {
        println!("Password meets the policy");
        Ok(())
    } else {
        Err(CliError::PolicyRejected(
            evaluation.violations.iter().map(ToString::to_string).collect(),
        ))
    }
}
