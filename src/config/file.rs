use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::types::{Config, ConfigError, GateConfig, Role};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    project: ProjectSection,
    paths: PathsSection,
    worktrees: WorktreesSection,
    integration: IntegrationSection,
    roles: Vec<Role>,
    gates: Vec<GateConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectSection {
    trunk_branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PathsSection {
    agent_sync_dir: Option<String>,
    tasks_dir: Option<String>,
    targets_file: Option<String>,
    journal: Option<String>,
    workspace_root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorktreesSection {
    branch_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntegrationSection {
    target_branch_pattern: Option<String>,
}

pub(super) fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    parse_toml(&content)
}

/// Unknown keys are ignored; missing keys keep their defaults.
pub(super) fn parse_toml(content: &str) -> Result<Config, ConfigError> {
    let parsed: FileConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut config = Config::default();
    if let Some(trunk) = parsed.project.trunk_branch {
        config.trunk_branch = Some(trunk);
    }
    if let Some(dir) = parsed.paths.agent_sync_dir {
        config.agent_sync_dir = dir;
    }
    if let Some(dir) = parsed.paths.tasks_dir {
        config.tasks_dir = dir;
    }
    if let Some(path) = parsed.paths.targets_file {
        config.targets_file = path;
    }
    if let Some(path) = parsed.paths.journal {
        // An empty string turns the journal off.
        config.journal_file = if path.trim().is_empty() { None } else { Some(path) };
    }
    if let Some(root) = parsed.paths.workspace_root {
        config.workspace_root = Some(root);
    }
    if let Some(prefix) = parsed.worktrees.branch_prefix {
        config.branch_prefix = prefix;
    }
    if let Some(pattern) = parsed.integration.target_branch_pattern {
        config.target_branch_pattern = pattern;
    }
    config.roles = parsed.roles;
    config.gates = parsed.gates;

    Ok(config)
}
