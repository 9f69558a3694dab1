pub mod edit;
pub mod replay;

use anyhow::Context;
use canopy_core::change::DocumentSnapshot;
use std::path::Path;

/// Read a JSON document snapshot from `path`.
pub fn read_snapshot(path: &Path) -> anyhow::Result<DocumentSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `snapshot` back to `path` as pretty JSON.
pub fn write_snapshot(path: &Path, snapshot: &DocumentSnapshot) -> anyhow::Result<()> {
    let mut content = serde_json::to_string_pretty(snapshot)?;
    content.push('\n');
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
