use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cli::CliArgs;
use super::{env, file};
use crate::error::ErrorKind;
use crate::git;

/// Default config file name, looked up at the repository root.
pub const DEFAULT_CONFIG_FILE: &str = "convoy.toml";

/// A category of worker with capacity constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "id")]
    pub role_id: String,
    pub token_budget: u64,
    pub complexity_threshold: u32,
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Paths every task of this role is expected to produce.
    #[serde(default)]
    pub deliverables: Vec<String>,
    /// Roles whose cards must finish before this role's cards.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Role {
    pub fn new(role_id: &str, token_budget: u64, complexity_threshold: u32) -> Self {
        Self {
            role_id: role_id.to_string(),
            token_budget,
            complexity_threshold,
            max_items: None,
            deliverables: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn with_depends_on(mut self, roles: &[&str]) -> Self {
        self.depends_on = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_deliverables(mut self, paths: &[&str]) -> Self {
        self.deliverables = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role_id.is_empty()
            || !self
                .role_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidRole(format!(
                "invalid role id '{}'",
                self.role_id
            )));
        }
        if self.token_budget == 0 {
            return Err(ConfigError::InvalidRole(format!(
                "role '{}': token_budget must be > 0",
                self.role_id
            )));
        }
        if self.complexity_threshold == 0 {
            return Err(ConfigError::InvalidRole(format!(
                "role '{}': complexity_threshold must be > 0",
                self.role_id
            )));
        }
        if self.max_items == Some(0) {
            return Err(ConfigError::InvalidRole(format!(
                "role '{}': max_items must be > 0",
                self.role_id
            )));
        }
        Ok(())
    }
}

/// A post-integration check run as a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub name: String,
    pub command: String,
}

/// convoy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Branch new integration targets are cut from (auto-detected when unset).
    pub trunk_branch: Option<String>,
    /// Directory holding status records.
    pub agent_sync_dir: String,
    /// Directory holding task cards and their index.
    pub tasks_dir: String,
    /// TOML file listing allocatable targets.
    pub targets_file: String,
    /// Journal of dispatched commands; `None` disables it.
    pub journal_file: Option<String>,
    /// Root for per-role workspaces (defaults to `../<repo>.worktrees`).
    pub workspace_root: Option<String>,
    /// Workspace branch prefix, giving `<prefix>/<role>/<task>`.
    pub branch_prefix: String,
    /// Integration branch name; `{date}` expands to today's date.
    pub target_branch_pattern: String,
    pub roles: Vec<Role>,
    pub gates: Vec<GateConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trunk_branch: None,
            agent_sync_dir: ".orchestration/runtime/agent-sync".to_string(),
            tasks_dir: ".orchestration/runtime/agent-sync/tasks".to_string(),
            targets_file: ".orchestration/runtime/targets.toml".to_string(),
            journal_file: Some(".orchestration/runtime/journal.log".to_string()),
            workspace_root: None,
            branch_prefix: "feat".to_string(),
            target_branch_pattern: "integration/{date}".to_string(),
            roles: Vec::new(),
            gates: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from all sources with proper precedence.
    ///
    /// Precedence: CLI args > env vars > config file > defaults. The file is
    /// `--config` when given, else `convoy.toml` at the repo root if present.
    pub fn load(cli_args: &CliArgs, repo_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ref path) = cli_args.config {
            config = Self::load_from_file(path)?;
        } else {
            let default_path = repo_root.join(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                config = Self::load_from_file(&default_path)?;
            }
        }

        config.apply_env();
        config.apply_cli(cli_args);

        if config.trunk_branch.is_none() {
            config.trunk_branch = detect_trunk(repo_root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        file::load_from_file(path)
    }

    /// Parse TOML content into configuration.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        file::parse_toml(content)
    }

    fn apply_env(&mut self) {
        env::apply_env(self);
    }

    /// Apply CLI arguments.
    pub(super) fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(ref trunk) = args.trunk {
            self.trunk_branch = Some(trunk.clone());
        }
        if let Some(ref dir) = args.agent_sync_dir {
            self.agent_sync_dir = dir.clone();
        }
        if let Some(ref dir) = args.tasks_dir {
            self.tasks_dir = dir.clone();
        }
        if let Some(ref path) = args.targets_file {
            self.targets_file = path.clone();
        }
        if let Some(ref root) = args.workspace_root {
            self.workspace_root = Some(root.clone());
        }
        if args.no_journal {
            self.journal_file = None;
        }
    }

    /// Check role table and patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        // Card ids upper-case the role and map `_` to `-`.
        let mut card_keys: std::collections::HashMap<String, &str> =
            std::collections::HashMap::new();
        for role in &self.roles {
            role.validate()?;
            if !seen.insert(role.role_id.as_str()) {
                return Err(ConfigError::InvalidRole(format!(
                    "duplicate role '{}'",
                    role.role_id
                )));
            }
            let key = role.role_id.to_uppercase().replace('_', "-");
            if let Some(other) = card_keys.insert(key, role.role_id.as_str()) {
                return Err(ConfigError::InvalidRole(format!(
                    "roles '{}' and '{}' would share task card ids",
                    other, role.role_id
                )));
            }
        }
        for role in &self.roles {
            for dep in &role.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(ConfigError::InvalidRole(format!(
                        "role '{}' depends on unknown role '{}'",
                        role.role_id, dep
                    )));
                }
            }
        }
        if self.branch_prefix.trim().is_empty() {
            return Err(ConfigError::Parse("worktrees.branch_prefix is empty".to_string()));
        }
        if self.target_branch_pattern.trim().is_empty() {
            return Err(ConfigError::Parse(
                "integration.target_branch_pattern is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn role(&self, role_id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.role_id == role_id)
    }

    pub fn trunk(&self) -> &str {
        self.trunk_branch.as_deref().unwrap_or("main")
    }

    /// Expand the integration target pattern for `date` (`YYYY-MM-DD`).
    pub fn integration_target(&self, date: &str) -> String {
        self.target_branch_pattern.replace("{date}", date)
    }

    /// Workspace root for a repository at `repo_root`.
    pub fn workspace_root_for(&self, repo_root: &Path) -> PathBuf {
        match self.workspace_root {
            Some(ref root) => resolve(repo_root, root),
            None => {
                let name = repo_root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "repo".to_string());
                repo_root
                    .parent()
                    .unwrap_or(repo_root)
                    .join(format!("{}.worktrees", name))
            }
        }
    }

    /// Generate default convoy.toml content.
    pub fn default_toml() -> String {
        r#"# convoy configuration

[project]
# trunk_branch = "main"

[paths]
agent_sync_dir = ".orchestration/runtime/agent-sync"
tasks_dir = ".orchestration/runtime/agent-sync/tasks"
targets_file = ".orchestration/runtime/targets.toml"
journal = ".orchestration/runtime/journal.log"

[worktrees]
branch_prefix = "feat"

[integration]
target_branch_pattern = "integration/{date}"

# [[roles]]
# id = "backend_developer"
# token_budget = 8000
# complexity_threshold = 6
# max_items = 4
# depends_on = []
# deliverables = []

# [[gates]]
# name = "tests"
# command = "cargo test"
"#
        .to_string()
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// `main`, then `master`, then whatever branch is checked out. Outside a
/// repository there is no trunk to detect.
pub(crate) fn detect_trunk(repo_root: &Path) -> Option<String> {
    ["main", "master"]
        .into_iter()
        .find(|branch| git::branch_exists(repo_root, branch).unwrap_or(false))
        .map(String::from)
        .or_else(|| git::current_branch(repo_root).ok().flatten())
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Parse(_) | Self::InvalidRole(_) => ErrorKind::Config,
        }
    }
}
