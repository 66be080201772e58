//! Check command - Report whether one record's link is intact

use clap::{Args, ValueEnum};

use shadowlink_core::{MirrorId, SourceId};
use shadowlink_sync::{LinkCheck, MirrorRepository, SourceRepository};

use crate::config::Settings;
use crate::error::{CliError, CliResult};
use crate::output::{print_field, print_json, print_ok, OutputFormat};

use super::Workspace;

/// Which side of a relationship the record lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordSide {
    /// A source record
    #[value(name = "post_type", alias = "source")]
    PostType,
    /// A mirror record
    #[value(name = "taxonomy", alias = "mirror")]
    Taxonomy,
}

/// Arguments for the check command
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Side of the relationship the record belongs to
    #[arg(value_enum)]
    pub side: RecordSide,

    /// Record ID
    #[arg(long)]
    pub id: String,

    /// Mirror kind (needed when several are declared)
    #[arg(long = "tax", value_name = "MIRROR_KIND")]
    pub mirror_kind: Option<String>,

    /// Source kind (needed when several are declared)
    #[arg(long = "cpt", value_name = "SOURCE_KIND")]
    pub source_kind: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

/// Pick the kind for one side: the flag, else the record's own kind, else
/// the only declared kind.
fn resolve_kind(
    flag: Option<&str>,
    from_record: Option<&str>,
    declared: &[String],
    flag_name: &str,
) -> CliResult<String> {
    if let Some(kind) = flag.or(from_record) {
        return Ok(kind.to_string());
    }
    match declared {
        [only] => Ok(only.clone()),
        [] => Err(CliError::Config(format!(
            "no kinds declared; pass {flag_name}"
        ))),
        _ => Err(CliError::Validation(format!(
            "{} kinds are declared; pass {flag_name} to pick one",
            declared.len()
        ))),
    }
}

/// Inspect one record's link without repairing it.
pub async fn inspect(args: &CheckArgs, settings: &Settings) -> CliResult<LinkCheck> {
    let workspace = Workspace::open(settings, settings.reconciliation())?;
    let store = workspace.store.as_ref();
    let snapshot = store.snapshot();

    match args.side {
        RecordSide::PostType => {
            let id: SourceId = args
                .id
                .parse()
                .map_err(|e| CliError::Validation(format!("--id: {e}")))?;
            let record = SourceRepository::get(store, id).await?;
            let source_kind = resolve_kind(
                args.source_kind.as_deref(),
                record.as_ref().map(|r| r.kind.as_str()),
                &snapshot.source_kinds,
                "--cpt",
            )?;
            let mirror_kind = resolve_kind(
                args.mirror_kind.as_deref(),
                None,
                &snapshot.mirror_kinds,
                "--tax",
            )?;
            let relationship = workspace.relationship(&source_kind, &mirror_kind)?;
            Ok(workspace
                .registry
                .inspector(&relationship)?
                .check_source(id)
                .await?)
        }
        RecordSide::Taxonomy => {
            let id: MirrorId = args
                .id
                .parse()
                .map_err(|e| CliError::Validation(format!("--id: {e}")))?;
            let record = MirrorRepository::get(store, id).await?;
            let mirror_kind = resolve_kind(
                args.mirror_kind.as_deref(),
                record.as_ref().map(|r| r.kind.as_str()),
                &snapshot.mirror_kinds,
                "--tax",
            )?;
            let source_kind = resolve_kind(
                args.source_kind.as_deref(),
                None,
                &snapshot.source_kinds,
                "--cpt",
            )?;
            let relationship = workspace.relationship(&source_kind, &mirror_kind)?;
            Ok(workspace
                .registry
                .inspector(&relationship)?
                .check_mirror(id)
                .await?)
        }
    }
}

/// Execute the check command
pub async fn execute(args: CheckArgs, settings: &Settings) -> CliResult<()> {
    let check = inspect(&args, settings).await?;

    match args.output {
        OutputFormat::Json => print_json(&check)?,
        OutputFormat::Table => {
            print_field("Record", &check.record);
            print_field("Relationship", &check.relationship.to_string());
            print_field("State", check.state.as_str());
            if let Some(counterpart) = &check.counterpart {
                print_field("Counterpart", counterpart);
            }
            print_field("Detail", &check.detail);
            if check.is_intact() {
                print_ok("Link is intact");
            }
        }
    }

    if check.is_intact() {
        Ok(())
    } else {
        Err(CliError::LinkBroken {
            record: check.record,
            state: check.state.to_string(),
        })
    }
}
