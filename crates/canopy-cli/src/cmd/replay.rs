//! `canopy replay`: build a hierarchy view from an event log.

use crate::cmd::read_snapshot;
use crate::output::{OutputMode, render_mode};
use anyhow::Context;
use canopy_core::config::ProjectConfig;
use canopy_core::document::InMemoryDocument;
use canopy_core::event::{EventBus, HierarchyEvent};
use canopy_core::hierarchy::{HierarchyModel, HierarchyUpdater, Outcome};
use canopy_core::model::EntityId;
use clap::Args;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of hierarchy events. Blank lines and `#` comments are skipped.
    pub events: PathBuf,

    /// Seed the view from a document snapshot before replaying.
    #[arg(long)]
    pub document: Option<PathBuf>,

    /// Only apply metadata events; structural events are ignored.
    #[arg(long)]
    pub metadata_only: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub absent: usize,
    pub deferred: usize,
    pub rejected: usize,
    /// Edges still waiting for a parent when the log ended.
    pub pending: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcomes: &[Outcome]) {
        self.events += 1;
        for outcome in outcomes {
            match outcome {
                Outcome::Applied => self.applied += 1,
                Outcome::Unchanged => self.unchanged += 1,
                Outcome::Absent => self.absent += 1,
                Outcome::Deferred => self.deferred += 1,
                Outcome::Rejected => self.rejected += 1,
                Outcome::Ignored => {}
            }
        }
    }
}

/// One line of the rendered hierarchy, in pre-order.
#[derive(Debug, Serialize)]
pub struct TreeRow {
    pub depth: usize,
    pub parent: Option<EntityId>,
    pub entity: EntityId,
    pub label: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    pub open_comments: u32,
    pub watchers: usize,
    /// Already expanded under an earlier parent; its children are not
    /// listed again.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub repeat: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub summary: ReplaySummary,
    pub rows: Vec<TreeRow>,
}

/// Walk the model depth-first from its roots with an explicit stack. A node
/// with several parents is expanded under the first one only.
fn tree_rows(model: &HierarchyModel) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    let mut expanded: HashSet<EntityId> = HashSet::new();
    let mut stack: Vec<(usize, Option<EntityId>, EntityId)> = model
        .roots()
        .into_iter()
        .rev()
        .map(|root| (0, None, root))
        .collect();

    while let Some((depth, parent, entity)) = stack.pop() {
        let Some(node) = model.get_node(&entity) else {
            continue;
        };
        let repeat = !expanded.insert(entity.clone());
        if !repeat {
            for child in model.children(&entity).into_iter().rev() {
                stack.push((depth + 1, Some(entity.clone()), child));
            }
        }
        rows.push(TreeRow {
            depth,
            parent,
            label: node.label().to_string(),
            deprecated: node.is_deprecated(),
            open_comments: node.open_comment_count(),
            watchers: node.watches().len(),
            repeat,
            entity,
        });
    }
    rows
}

fn read_events(path: &Path) -> anyhow::Result<Vec<HierarchyEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed event", path.display(), n + 1))
        })
        .collect()
}

pub fn run_replay(
    args: &ReplayArgs,
    config: &ProjectConfig,
    output: OutputMode,
) -> anyhow::Result<()> {
    let events = read_events(&args.events)?;

    let mut bus = EventBus::new();
    let updater = if args.metadata_only {
        HierarchyUpdater::metadata_only()
    } else {
        HierarchyUpdater::new()
    };
    let model = HierarchyModel::with_orphan_policy(config.hierarchy.orphan_policy());
    let mut started = updater.start(&mut bus, model);

    let mut summary = ReplaySummary::default();
    if let Some(path) = &args.document {
        let seed = InMemoryDocument::from_snapshot(read_snapshot(path)?).replay_events();
        for event in &seed {
            started.deliver(&bus, event);
        }
    }
    for event in &events {
        let outcomes = started.deliver(&bus, event);
        summary.record(&outcomes);
    }

    let model = started.stop(&mut bus);
    summary.pending = model.pending_len();
    tracing::info!(events = summary.events, nodes = model.len(), "replayed event log");

    let report = ReplayReport {
        rows: tree_rows(&model),
        summary,
    };
    render_mode(output, &report, render_text, render_pretty)
}

fn render_text(report: &ReplayReport, w: &mut dyn Write) -> io::Result<()> {
    for row in &report.rows {
        let parent = row.parent.as_ref().map_or("-", EntityId::as_str);
        writeln!(w, "{parent}\t{}\t{}", row.entity, row.label)?;
    }
    Ok(())
}

fn render_pretty(report: &ReplayReport, w: &mut dyn Write) -> io::Result<()> {
    for row in &report.rows {
        let indent = "  ".repeat(row.depth);
        write!(w, "{indent}{}", row.label)?;
        if row.label != row.entity.as_str() {
            write!(w, " <{}>", row.entity)?;
        }
        if row.deprecated {
            write!(w, " [deprecated]")?;
        }
        if row.open_comments > 0 {
            write!(w, " ({} open)", row.open_comments)?;
        }
        if row.watchers > 0 {
            write!(w, " ({} watching)", row.watchers)?;
        }
        if row.repeat {
            write!(w, " [see above]")?;
        }
        writeln!(w)?;
    }
    let s = &report.summary;
    writeln!(
        w,
        "\n{} events: {} applied, {} unchanged, {} absent, {} deferred, {} rejected",
        s.events, s.applied, s.unchanged, s.absent, s.deferred, s.rejected
    )?;
    if s.pending > 0 {
        writeln!(w, "{} edges still waiting for a parent", s.pending)?;
    }
    Ok(())
}
