//! idbridge CLI
//!
//! Operator tool over the identity engine:
//! - Run a reconciliation of the ERP roster, local accounts and directory
//! - Check a password against the policy
//! - Try a hybrid login
//! - Change a password
//!
//! Settings come from `IDBRIDGE_*` variables, optionally in a `.env` file.

use clap::{Parser, Subcommand};
use idbridge_cli::commands::{self, StoreArgs};
use idbridge_cli::logging::{init_logging, DEFAULT_FILTER};
use idbridge_cli::CliResult;

/// idbridge - identity reconciliation and hybrid authentication
#[derive(Parser)]
#[command(name = "idbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    stores: StoreArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the ERP roster, local accounts and the directory roster
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Check a password against the password policy
    CheckPassword(commands::check_password::CheckPasswordArgs),

    /// Authenticate a user through the directory or local credentials
    Login(commands::login::LoginArgs),

    /// Change a user's password
    ChangePassword(commands::change_password::ChangePasswordArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(DEFAULT_FILTER, cli.log_json);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Reconcile(args) => commands::reconcile::execute(args, &cli.stores).await,
        Commands::CheckPassword(args) => {
            commands::check_password::execute(args, &cli.stores).await
        }
        Commands::Login(args) => commands::login::execute(args, &cli.stores).await,
        Commands::ChangePassword(args) => {
            commands::change_password::execute(args, &cli.stores).await
        }
    }
}
