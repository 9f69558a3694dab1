//! `canopy create` / `canopy move`: change sets against a document file.

use crate::cmd::{read_snapshot, write_snapshot};
use crate::output::{CliError, OutputMode, render_error, render_mode};
use canopy_core::change::{ChangeGenerationContext, ChangeSet, EditRequest, generate};
use canopy_core::config::ProjectConfig;
use canopy_core::document::InMemoryDocument;
use canopy_core::edit::{EditError, submit};
use canopy_core::event::HierarchyEvent;
use canopy_core::model::{EntityId, EntityKind};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Kind of entity: class, object_property, data_property,
    /// annotation_property, or named_individual.
    #[arg(long, default_value = "class")]
    pub kind: EntityKind,

    /// Text the new entity's name and label are derived from.
    #[arg(long)]
    pub text: String,

    /// Existing entity to place the new one under.
    #[arg(long)]
    pub parent: Option<String>,

    /// JSON document snapshot to generate against.
    #[arg(long)]
    pub document: PathBuf,

    /// Apply the change set and write the updated document back.
    #[arg(long)]
    pub apply: bool,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Entity to move.
    pub entity: String,

    /// Current parent to detach from. Omit when the entity sits at the root.
    #[arg(long)]
    pub from: Option<String>,

    /// New parent.
    #[arg(long)]
    pub to: String,

    /// JSON document snapshot to generate against.
    #[arg(long)]
    pub document: PathBuf,

    /// Apply the change set and write the updated document back.
    #[arg(long)]
    pub apply: bool,
}

#[derive(Debug, Serialize)]
pub struct EditReport {
    pub digest: String,
    pub changes: ChangeSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<HierarchyEvent>,
}

pub fn run_create(
    args: &CreateArgs,
    config: &ProjectConfig,
    output: OutputMode,
) -> anyhow::Result<()> {
    let request = EditRequest::create(
        args.kind,
        args.text.as_str(),
        args.parent.as_deref().map(EntityId::new),
    );
    run_request(&request, &args.document, args.apply, config, output)
}

pub fn run_move(args: &MoveArgs, config: &ProjectConfig, output: OutputMode) -> anyhow::Result<()> {
    let request = EditRequest::MoveEntity {
        entity: EntityId::new(args.entity.as_str()),
        from: args.from.as_deref().map(EntityId::new),
        to: EntityId::new(args.to.as_str()),
    };
    run_request(&request, &args.document, args.apply, config, output)
}

fn run_request(
    request: &EditRequest,
    document: &Path,
    apply: bool,
    config: &ProjectConfig,
    output: OutputMode,
) -> anyhow::Result<()> {
    let snapshot = read_snapshot(document)?;

    let report = if apply {
        let mut doc = InMemoryDocument::from_snapshot(snapshot);
        let submitted = submit(request, &mut doc, &config.changes)
            .or_else(|e| fail(output, &e))?;
        write_snapshot(document, doc.state())?;
        EditReport {
            digest: submitted.applied.digest,
            changes: submitted.changes,
            revision: Some(submitted.applied.revision),
            events: submitted.applied.events,
        }
    } else {
        let context = ChangeGenerationContext::from_config(&snapshot, &config.changes);
        let changes = generate(request, context).or_else(|e| fail(output, &e.into()))?;
        EditReport {
            digest: changes.digest(),
            changes,
            revision: None,
            events: Vec::new(),
        }
    };

    render_mode(output, &report, render_text, render_pretty)
}

fn fail<T>(output: OutputMode, error: &EditError) -> anyhow::Result<T> {
    render_error(output, &CliError::coded(error.to_string(), error.code()))?;
    anyhow::bail!("{error}")
}

fn render_text(report: &EditReport, w: &mut dyn Write) -> io::Result<()> {
    write!(w, "{}", report.changes)
}

fn render_pretty(report: &EditReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "change set {}", report.digest)?;
    if report.changes.is_empty() {
        writeln!(w, "  (no changes)")?;
    }
    for change in &report.changes {
        writeln!(w, "  {change}")?;
    }
    if let Some(revision) = report.revision {
        writeln!(
            w,
            "applied as revision {revision} ({} hierarchy events)",
            report.events.len()
        )?;
    }
    Ok(())
}
