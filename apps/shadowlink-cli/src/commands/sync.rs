//! Sync command - Reconcile one relationship over its whole collections

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shadowlink_sync::reconciliation::ActionType;
use shadowlink_sync::{
    FailurePolicy, ReconciliationError, ReconciliationMode, ReconciliationReport, RunStatus,
};

use crate::config::Settings;
use crate::error::{CliError, CliResult};
use crate::output::{
    print_field, print_json, print_ok, print_warning, render_changes, OutputFormat,
};

use super::Workspace;

/// Arguments for the sync command
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Source kind to reconcile
    #[arg(long = "cpt", value_name = "SOURCE_KIND")]
    pub source_kind: String,

    /// Mirror kind to reconcile
    #[arg(long = "tax", value_name = "MIRROR_KIND")]
    pub mirror_kind: String,

    /// Report what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Records per page (overrides SHADOWLINK_PAGE_SIZE)
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Keep going after a failed action (overrides SHADOWLINK_FAILURE_POLICY)
    #[arg(long)]
    pub continue_on_error: bool,
}

impl SyncArgs {
    fn mode(&self) -> ReconciliationMode {
        ReconciliationMode::from_dry_run(self.dry_run)
    }
}

/// Run one pass and persist what it applied.
///
/// The outer error covers everything that stops the pass from starting
/// (data file, unknown kinds). The inner result is the engine's own.
pub async fn reconcile(
    args: &SyncArgs,
    settings: &Settings,
    cancel: &CancellationToken,
) -> CliResult<Result<ReconciliationReport, ReconciliationError>> {
    let mut config = settings.reconciliation();
    if let Some(page_size) = args.page_size {
        config = config.with_page_size(page_size);
    }
    if args.continue_on_error {
        config = config.with_failure_policy(FailurePolicy::Continue);
    }
    config.validate()?;

    let workspace = Workspace::open(settings, config)?;
    let relationship = workspace.relationship(&args.source_kind, &args.mirror_kind)?;
    let engine = workspace.registry.engine(&relationship)?;

    let mode = args.mode();
    let result = engine.run(mode, cancel).await;

    let touched = match &result {
        Ok(report) => report.touched(),
        Err(e) => e.partial_report().map_or(0, ReconciliationReport::touched),
    };
    if !mode.is_dry_run() && touched > 0 {
        workspace.file.save(&workspace.store)?;
    }

    Ok(result)
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, settings: &Settings) -> CliResult<()> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current chunk");
                cancel.cancel();
            }
        })
    };

    let outcome = reconcile(&args, settings, &cancel).await;
    interrupt.abort();

    match outcome? {
        Ok(report) => {
            render(&report, args.output)?;
            verdict(&report)
        }
        Err(e) => {
            if let Some(partial) = e.partial_report() {
                render(partial, args.output)?;
            }
            Err(e.into())
        }
    }
}

/// Exit status of a finished pass.
pub fn verdict(report: &ReconciliationReport) -> CliResult<()> {
    if report.status == RunStatus::Cancelled {
        return Err(CliError::Cancelled);
    }
    if report.statistics.failed > 0 {
        return Err(CliError::Incomplete {
            failed: report.statistics.failed,
        });
    }
    info!(run_id = %report.run_id, outcome = %report.outcome, "Sync complete");
    Ok(())
}

fn render(report: &ReconciliationReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            if report.mode.is_dry_run() {
                println!("Dry run: {}", report.relationship);
                println!();
                println!("{}", render_changes(report));
                println!();
            }

            let stats = &report.statistics;
            let counts = if report.mode.is_dry_run() {
                &stats.planned
            } else {
                &stats.applied
            };
            for action in ActionType::APPLY_ORDER {
                print_field(action.as_str(), &counts.get(action).to_string());
            }
            if stats.skipped > 0 {
                print_field("skipped", &stats.skipped.to_string());
            }
            for failure in &report.failures {
                print_warning(&format!(
                    "{} of {} failed: {}",
                    failure.action, failure.record, failure.message
                ));
            }

            print_ok(&format!("{}: {}", report.relationship, report.outcome));
            Ok(())
        }
    }
}
