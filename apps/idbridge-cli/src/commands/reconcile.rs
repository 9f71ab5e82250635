//! Reconcile command - sync ERP roster, local accounts and the directory

use clap::Args;
use idbridge::{ReconcileOptions, ReconciliationReport};

use super::{open_service, StoreArgs};
use crate::error::{CliError, CliResult};

/// Arguments for the reconcile command
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Fetch a fresh directory roster instead of using the cache
    #[arg(long)]
    pub full: bool,

    /// Also create accounts for inactive ERP records
    #[arg(long)]
    pub include_inactive: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReconcileArgs {
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            only_active: !self.include_inactive,
            force_full: self.full,
        }
    }
}

/// Execute the reconcile command
pub async fn execute(args: ReconcileArgs, stores: &StoreArgs) -> CliResult<()> {
    if stores.erp_roster.is_none() {
        return Err(CliError::Input(
            "--erp-roster (or IDBRIDGE_ERP_ROSTER) is required".to_string(),
        ));
    }
    let service = open_service(stores).await?;
    let report = service.run_reconciliation(args.options()).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Io(format!("cannot render report: {e}")))?;
        println!("{json}");
    } else {
        print!("{}", render_summary(&report));
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::PartialFailure(report.errors.len()))
    }
}

/// Human-readable report.
pub fn render_summary(report: &ReconciliationReport) -> String {
    let mut out = format!(
        "Reconciled {} ERP record(s) against {} directory identit{}{}\n",
        report.erp_roster_size,
        report.directory_roster_size,
        if report.directory_roster_size == 1 { "y" } else { "ies" },
        if report.directory_roster_cached { " (cached)" } else { "" },
    );
    out.push_str(&format!(
        "  created: {}\n  updated: {}\n  unchanged: {}\n  skipped: {}\n  deactivated: {}\n",
        report.created, report.updated, report.unchanged, report.skipped, report.deactivated
    ));
    for error in &report.errors {
        let subject = error
            .erp_person_id
            .as_ref()
            .map(|id| format!("ERP {id}"))
            .or_else(|| error.account_id.map(|id| format!("account {id}")))
            .unwrap_or_else(|| "run".to_string());
        out.push_str(&format!("  error [{subject}]: {}\n", error.message));
    }
    out
}
