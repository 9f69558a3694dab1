use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::hierarchy::OrphanPolicy;

/// Settings read from `.canopy/config.toml` in the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub changes: ChangeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Park edges whose parent is not yet in the view instead of dropping them.
    #[serde(default = "default_true")]
    pub defer_orphans: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            defer_orphans: default_true(),
        }
    }
}

impl HierarchyConfig {
    #[must_use]
    pub const fn orphan_policy(&self) -> OrphanPolicy {
        if self.defer_orphans {
            OrphanPolicy::Defer
        } else {
            OrphanPolicy::Reject
        }
    }
}

/// Which naming policy fresh entities are allocated under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicyKind {
    /// `Widget`, `Widget (1)`, `Widget (2)`, ...
    #[default]
    Numbered,
    /// `Blue_Widget`, `Blue_Widget_1`, ...
    Underscored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeConfig {
    #[serde(default)]
    pub naming: NamingPolicyKind,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Emit a label assertion carrying the original source text.
    #[serde(default = "default_true")]
    pub emit_labels: bool,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            naming: NamingPolicyKind::default(),
            max_attempts: default_max_attempts(),
            emit_labels: default_true(),
        }
    }
}

/// Settings read from the per-user config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.canopy/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".canopy/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `<config dir>/canopy/config.toml`, or defaults if absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("canopy/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project and user config with the output mode resolved from, in
/// order, the `--json` flag, `CANOPY_FORMAT`, the user config, and whether
/// stdout is a terminal.
///
/// # Errors
///
/// Propagates config load failures.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("CANOPY_FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "tree" => Some("pretty"),
        "text" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_attempts() -> u32 {
    1000
}
